//! Error taxonomy and shape validation for the forget-mult engines.

/// Validated `[seq_len, batch, hidden]` extent of a forget-mult call.
///
/// Storage is time-major, lane-minor: element `(t, lane)` lives at
/// `t * lanes() + lane`, where a lane is one `(batch, hidden)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeqDims {
    pub seq_len: usize,
    pub batch: usize,
    pub hidden: usize,
}

impl SeqDims {
    #[must_use]
    pub fn new(seq_len: usize, batch: usize, hidden: usize) -> Self {
        Self {
            seq_len,
            batch,
            hidden,
        }
    }

    /// Number of independent scalar recurrences.
    #[must_use]
    pub fn lanes(&self) -> usize {
        self.batch * self.hidden
    }

    /// Element count of a `[seq_len, batch, hidden]` sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seq_len * self.lanes()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn index(&self, t: usize, lane: usize) -> usize {
        t * self.lanes() + lane
    }

    #[must_use]
    pub fn seq_shape(&self) -> [usize; 3] {
        [self.seq_len, self.batch, self.hidden]
    }

    #[must_use]
    pub fn state_shape(&self) -> [usize; 2] {
        [self.batch, self.hidden]
    }

    /// Validate gate, feature and optional initial-state shapes.
    pub fn from_shapes(
        gates: [usize; 3],
        features: [usize; 3],
        initial: Option<[usize; 2]>,
    ) -> Result<Self, ForgetMultError> {
        if gates != features {
            return Err(ForgetMultError::Shape(format!(
                "gates {gates:?} and features {features:?} must have the same shape"
            )));
        }
        let [seq_len, batch, hidden] = features;
        if let Some(initial) = initial
            && initial != [batch, hidden]
        {
            return Err(ForgetMultError::Shape(format!(
                "initial state {initial:?} does not match trailing dims [{batch}, {hidden}]"
            )));
        }
        Ok(Self::new(seq_len, batch, hidden))
    }

    /// Check that an upstream gradient matches the forward extent.
    pub fn check_grad(&self, grad: [usize; 3]) -> Result<(), ForgetMultError> {
        if grad == self.seq_shape() {
            Ok(())
        } else {
            Err(ForgetMultError::StateConsistency(format!(
                "upstream gradient {grad:?} does not match forward sequence {:?}",
                self.seq_shape()
            )))
        }
    }
}

/// Errors reported by forget-mult forward and backward passes.
///
/// All of them are raised before any output is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForgetMultError {
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error("placement: {0}")]
    Placement(String),
    #[error("inconsistent saved state: {0}")]
    StateConsistency(String),
}

pub type Result<T, E = ForgetMultError> = std::result::Result<T, E>;
