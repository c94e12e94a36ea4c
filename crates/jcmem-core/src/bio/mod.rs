//! Biometric template bookkeeping.
//!
//! Matching itself is delegated to a [`BioMatcher`] collaborator. This module
//! owns the template lifecycle (enrolment, validation, match sessions) and
//! the try counter, whose updates bypass the commit log.

mod counter;
mod template;
#[cfg(test)]
mod tests;

pub use template::StoredTemplate;

use crate::{
    error::{BioReason, CardError},
    runtime::CardRuntime,
};

/// Lowest score a matcher reports for a successful match.
pub const MINIMUM_SUCCESSFUL_MATCH_SCORE: i16 = 16384;

/// Score reported when the matcher needs another `match_data` call.
pub const MATCH_NEEDS_MORE_DATA: i16 = -1;

/// Biometric type codes reported by [`BioTemplate::bio_type`].
pub mod bio_type {
    pub const DEFAULT_INITPARAM: u8 = 0;
    pub const FACIAL_FEATURE: u8 = 1;
    pub const VOICE_PRINT: u8 = 2;
    pub const FINGERPRINT: u8 = 3;
    pub const IRIS_SCAN: u8 = 4;
    pub const RETINA_SCAN: u8 = 5;
    pub const HAND_GEOMETRY: u8 = 6;
    pub const SIGNATURE: u8 = 7;
    pub const KEYSTROKES: u8 = 8;
    pub const LIP_MOVEMENT: u8 = 9;
    pub const THERMAL_FACE: u8 = 10;
    pub const THERMAL_HAND: u8 = 11;
    pub const GAIT_STYLE: u8 = 12;
    pub const BODY_ODOR: u8 = 13;
    pub const DNA_SCAN: u8 = 14;
    pub const EAR_GEOMETRY: u8 = 15;
    pub const FINGER_GEOMETRY: u8 = 16;
    pub const PALM_GEOMETRY: u8 = 17;
    pub const VEIN_PATTERN: u8 = 18;
    pub const PASSWORD: u8 = 31;
}

///
/// MatchOutcome
///
/// Classification of a raw matcher score.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchOutcome {
    Success { score: i16 },
    Failure { score: i16 },
    NeedsMoreData,
}

impl MatchOutcome {
    /// Classify `score`; negative scores other than
    /// [`MATCH_NEEDS_MORE_DATA`] are invalid.
    pub fn from_score(score: i16) -> Result<Self, CardError> {
        match score {
            MATCH_NEEDS_MORE_DATA => Ok(Self::NeedsMoreData),
            s if s >= MINIMUM_SUCCESSFUL_MATCH_SCORE => Ok(Self::Success { score: s }),
            s if s >= 0 => Ok(Self::Failure { score: s }),
            s => Err(CardError::bio(
                BioReason::InvalidData,
                format!("matcher returned invalid score {s}"),
            )),
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

///
/// MatchPhase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchPhase {
    /// First call of a session (`init_match`).
    Initial,
    /// Follow-up call after [`MATCH_NEEDS_MORE_DATA`].
    Continuation,
}

///
/// BioMatcher
///
/// External matching engine plugged into a [`StoredTemplate`].
///

pub trait BioMatcher {
    /// Score `candidate` against the enrolled `reference`.
    fn score(&mut self, reference: &[u8], candidate: &[u8], phase: MatchPhase) -> i16;

    /// Part of `reference` a terminal may read before matching.
    fn public_data<'a>(&self, reference: &'a [u8]) -> &'a [u8] {
        let _ = reference;
        &[]
    }
}

///
/// BioTemplate
///

pub trait BioTemplate {
    fn bio_type(&self) -> u8;

    fn is_initialized(&self) -> bool;

    fn is_validated(&self) -> bool;

    /// Clear the validated flag and close any match session.
    fn reset(&mut self);

    fn tries_remaining(&self, card: &CardRuntime) -> Result<u8, CardError>;

    fn version(&self) -> [u8; 3];

    /// Copy public template data from `public_offset` into `dest`, returning
    /// the number of bytes copied.
    fn public_template_data(&self, public_offset: usize, dest: &mut [u8]) -> Result<usize, CardError>;

    /// Open a match session and score the first candidate chunk.
    fn init_match(&mut self, card: &mut CardRuntime, candidate: &[u8]) -> Result<i16, CardError>;

    /// Continue a session that returned [`MATCH_NEEDS_MORE_DATA`].
    fn match_data(&mut self, card: &mut CardRuntime, candidate: &[u8]) -> Result<i16, CardError>;
}

///
/// OwnerBioTemplate
///
/// Enrolment and administration, available only to the owning applet.
///

pub trait OwnerBioTemplate: BioTemplate {
    fn init(&mut self, data: &[u8]) -> Result<(), CardError>;

    fn update(&mut self, data: &[u8]) -> Result<(), CardError>;

    fn do_final(&mut self) -> Result<(), CardError>;

    fn reset_unblock_and_set_try_limit(
        &mut self,
        card: &mut CardRuntime,
        try_limit: u8,
    ) -> Result<(), CardError>;
}
