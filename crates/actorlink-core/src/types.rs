use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BehaviorName
// ---------------------------------------------------------------------------

/// Name of a group of actors sharing one [`BehaviorSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorName(String);

impl BehaviorName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BehaviorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BehaviorName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BehaviorName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for BehaviorName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// ---------------------------------------------------------------------------
// ActorId
// ---------------------------------------------------------------------------

/// Identifier of one actor within a behavior group, supplied by the simulation.
///
/// Unique within its behavior for the lifetime of one episode. The protocol
/// never interprets the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub i32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i32> for ActorId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// SideChannelId
// ---------------------------------------------------------------------------

/// 128-bit identifier of a side channel.
///
/// On the wire the id occupies 16 bytes in the mixed-endian GUID layout
/// (first three fields little-endian), which is what .NET `Guid.ToByteArray`
/// and Python `uuid.UUID(bytes_le=...)` peers produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SideChannelId(Uuid);

impl SideChannelId {
    /// Number of bytes the id occupies in a side-channel frame.
    pub const WIRE_LEN: usize = 16;

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Parse the canonical hyphenated form, e.g. `"621f0a70-4f87-11ea-a6bf-784f4387d1f7"`.
    pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_wire_bytes(self) -> [u8; 16] {
        self.0.to_bytes_le()
    }

    pub fn from_wire_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes_le(bytes))
    }
}

impl fmt::Display for SideChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Flat f32 vector produced by one sensor of one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation {
    data: Vec<f32>,
}

impl Observation {
    pub const fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

impl From<Vec<f32>> for Observation {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Decision returned by the peer for one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Continuous control values.
    Continuous(Vec<f32>),
    /// One choice per discrete branch.
    Discrete(Vec<u64>),
}

impl Action {
    pub fn zeros(spec: &ActionSpec) -> Self {
        match spec {
            ActionSpec::Continuous { size } => Self::Continuous(vec![0.0; *size]),
            ActionSpec::Discrete { branches } => Self::Discrete(vec![0; branches.len()]),
        }
    }

    /// Number of scalar elements.
    pub const fn len(&self) -> usize {
        match self {
            Self::Continuous(v) => v.len(),
            Self::Discrete(v) => v.len(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Continuous values, or `None` for discrete actions.
    pub fn as_continuous(&self) -> Option<&[f32]> {
        match self {
            Self::Continuous(v) => Some(v),
            Self::Discrete(_) => None,
        }
    }

    /// Branch choices, or `None` for continuous actions.
    pub fn as_discrete(&self) -> Option<&[u64]> {
        match self {
            Self::Discrete(v) => Some(v),
            Self::Continuous(_) => None,
        }
    }
}

impl From<Vec<f32>> for Action {
    fn from(data: Vec<f32>) -> Self {
        Self::Continuous(data)
    }
}

// ---------------------------------------------------------------------------
// ActionSpec
// ---------------------------------------------------------------------------

/// Shape of the actions a behavior accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
    Continuous { size: usize },
    /// Each entry is the number of choices in that branch.
    Discrete { branches: Vec<usize> },
}

impl ActionSpec {
    /// Number of scalar elements in one action.
    pub fn size(&self) -> usize {
        match self {
            Self::Continuous { size } => *size,
            Self::Discrete { branches } => branches.len(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn contains(&self, action: &Action) -> bool {
        match (self, action) {
            (Self::Continuous { size }, Action::Continuous(v)) => v.len() == *size,
            (Self::Discrete { branches }, Action::Discrete(v)) => {
                v.len() == branches.len()
                    && v.iter().zip(branches).all(|(choice, n)| (*choice as usize) < *n)
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// BehaviorSpec
// ---------------------------------------------------------------------------

/// Immutable description of a behavior's observation and action shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorSpec {
    pub name: BehaviorName,
    /// One shape per observation the actors of this behavior produce.
    pub observation_shapes: Vec<Vec<usize>>,
    pub action_spec: ActionSpec,
    /// Whether the peer should train on this behavior or only run inference.
    #[serde(default = "default_is_training")]
    pub is_training: bool,
}

const fn default_is_training() -> bool {
    true
}

impl BehaviorSpec {
    pub fn new(
        name: impl Into<BehaviorName>,
        observation_shapes: Vec<Vec<usize>>,
        action_spec: ActionSpec,
    ) -> Self {
        Self {
            name: name.into(),
            observation_shapes,
            action_spec,
            is_training: true,
        }
    }

    #[must_use]
    pub const fn inference_only(mut self) -> Self {
        self.is_training = false;
        self
    }

    /// Total number of observation scalars per actor.
    pub fn observation_size(&self) -> usize {
        self.observation_shapes
            .iter()
            .map(|shape| shape.iter().product::<usize>())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// ObservationRecord
// ---------------------------------------------------------------------------

/// One actor's observations for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub actor_id: ActorId,
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub reward: f32,
    /// The actor's episode ended with this step.
    #[serde(default)]
    pub done: bool,
    /// The episode ended because it hit its step limit rather than a terminal state.
    #[serde(default)]
    pub max_step_reached: bool,
    /// Per discrete choice, `true` when the choice is masked out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_mask: Option<Vec<bool>>,
}

impl ObservationRecord {
    pub fn new(actor_id: impl Into<ActorId>, observations: Vec<Observation>) -> Self {
        Self {
            actor_id: actor_id.into(),
            observations,
            reward: 0.0,
            done: false,
            max_step_reached: false,
            action_mask: None,
        }
    }

    #[must_use]
    pub const fn with_reward(mut self, reward: f32) -> Self {
        self.reward = reward;
        self
    }

    #[must_use]
    pub const fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    #[must_use]
    pub const fn with_max_step_reached(mut self, max_step_reached: bool) -> Self {
        self.max_step_reached = max_step_reached;
        self
    }

    #[must_use]
    pub fn with_action_mask(mut self, mask: Vec<bool>) -> Self {
        self.action_mask = Some(mask);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
