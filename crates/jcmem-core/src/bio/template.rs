use crate::{
    bio::{
        BioMatcher, BioTemplate, MatchOutcome, MatchPhase, OwnerBioTemplate, counter::TryCounter,
    },
    error::{BioReason, CardError},
    runtime::CardRuntime,
    store::ArrayRef,
};

const TEMPLATE_VERSION: [u8; 3] = [1, 0, 0];

///
/// StoredTemplate
///
/// Reference template enrolled on card, matched by an external engine.
///

pub struct StoredTemplate<M> {
    bio_type: u8,
    counter: TryCounter,
    reference: Vec<u8>,
    enrolment: Option<Vec<u8>>,
    initialized: bool,
    validated: bool,
    session_open: bool,
    matcher: M,
}

impl<M: BioMatcher> StoredTemplate<M> {
    /// Create an uninitialized template whose try counter lives in card memory.
    pub fn new(
        card: &mut CardRuntime,
        bio_type: u8,
        try_limit: u8,
        matcher: M,
    ) -> Result<Self, CardError> {
        let counter = TryCounter::allocate(card.memory_mut(), try_limit)?;

        Ok(Self {
            bio_type,
            counter,
            reference: Vec::new(),
            enrolment: None,
            initialized: false,
            validated: false,
            session_open: false,
            matcher,
        })
    }

    /// Persistent array backing the try counter.
    #[must_use]
    pub const fn counter_array(&self) -> ArrayRef {
        self.counter.array()
    }

    pub const fn matcher(&self) -> &M {
        &self.matcher
    }

    fn require_initialized(&self) -> Result<(), CardError> {
        if self.initialized {
            Ok(())
        } else {
            Err(CardError::bio(
                BioReason::NoTemplatesEnrolled,
                "no reference template enrolled",
            ))
        }
    }

    // Apply a raw score to the session and the try counter.
    fn settle(&mut self, card: &mut CardRuntime, score: i16) -> Result<i16, CardError> {
        let outcome = match MatchOutcome::from_score(score) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.session_open = false;
                return Err(err);
            }
        };

        let memory = card.memory_mut();
        match outcome {
            MatchOutcome::NeedsMoreData => self.session_open = true,
            MatchOutcome::Success { .. } => {
                self.session_open = false;
                self.validated = true;
                self.counter.record_success(memory)?;
                memory.debug_log(format!("bio template {} validated", self.bio_type));
            }
            MatchOutcome::Failure { .. } => {
                self.session_open = false;
                let remaining = self.counter.record_failure(memory)?;
                memory.debug_log(format!(
                    "bio template {} match failed, {remaining} tries remaining",
                    self.bio_type
                ));
            }
        }

        Ok(score)
    }
}

impl<M: BioMatcher> BioTemplate for StoredTemplate<M> {
    fn bio_type(&self) -> u8 {
        self.bio_type
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_validated(&self) -> bool {
        self.validated
    }

    fn reset(&mut self) {
        self.validated = false;
        self.session_open = false;
    }

    fn tries_remaining(&self, card: &CardRuntime) -> Result<u8, CardError> {
        self.counter.remaining(card.memory())
    }

    fn version(&self) -> [u8; 3] {
        TEMPLATE_VERSION
    }

    fn public_template_data(&self, public_offset: usize, dest: &mut [u8]) -> Result<usize, CardError> {
        self.require_initialized()?;

        let public = self.matcher.public_data(&self.reference);
        let tail = public.get(public_offset..).ok_or_else(|| {
            CardError::bio(
                BioReason::IllegalValue,
                format!(
                    "public data offset {public_offset} beyond {} bytes",
                    public.len()
                ),
            )
        })?;
        let copied = tail.len().min(dest.len());
        dest[..copied].copy_from_slice(&tail[..copied]);

        Ok(copied)
    }

    fn init_match(&mut self, card: &mut CardRuntime, candidate: &[u8]) -> Result<i16, CardError> {
        self.require_initialized()?;
        self.reset();

        // A blocked template fails without consulting the matcher.
        if self.counter.is_blocked(card.memory())? {
            card.memory()
                .debug_log(format!("bio template {} is blocked", self.bio_type));
            return Ok(0);
        }

        let score = self
            .matcher
            .score(&self.reference, candidate, MatchPhase::Initial);
        self.settle(card, score)
    }

    fn match_data(&mut self, card: &mut CardRuntime, candidate: &[u8]) -> Result<i16, CardError> {
        if !self.session_open {
            return Err(CardError::bio(
                BioReason::IllegalUse,
                "match_data called without an open match session",
            ));
        }

        let score = self
            .matcher
            .score(&self.reference, candidate, MatchPhase::Continuation);
        self.settle(card, score)
    }
}

impl<M: BioMatcher> OwnerBioTemplate for StoredTemplate<M> {
    fn init(&mut self, data: &[u8]) -> Result<(), CardError> {
        self.initialized = false;
        self.reference.clear();
        self.reset();
        self.enrolment = Some(data.to_vec());

        Ok(())
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CardError> {
        let enrolment = self.enrolment.as_mut().ok_or_else(|| {
            CardError::bio(BioReason::IllegalUse, "update called before init")
        })?;
        enrolment.extend_from_slice(data);

        Ok(())
    }

    fn do_final(&mut self) -> Result<(), CardError> {
        let enrolment = self.enrolment.take().ok_or_else(|| {
            CardError::bio(BioReason::IllegalUse, "do_final called before init")
        })?;
        if enrolment.is_empty() {
            return Err(CardError::bio(
                BioReason::InvalidData,
                "enrolment produced an empty reference template",
            ));
        }

        self.reference = enrolment;
        self.initialized = true;

        Ok(())
    }

    fn reset_unblock_and_set_try_limit(
        &mut self,
        card: &mut CardRuntime,
        try_limit: u8,
    ) -> Result<(), CardError> {
        self.counter.reset_limit(card.memory_mut(), try_limit)?;
        self.reset();

        Ok(())
    }
}
