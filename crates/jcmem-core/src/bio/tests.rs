use super::*;
use crate::error::ErrorClass;
use std::collections::VecDeque;

///
/// ScriptedMatcher
/// Replays fixed scores; the first two reference bytes are public.
///

struct ScriptedMatcher {
    scores: VecDeque<i16>,
    phases: Vec<MatchPhase>,
}

impl ScriptedMatcher {
    fn new(scores: &[i16]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            phases: Vec::new(),
        }
    }
}

impl BioMatcher for ScriptedMatcher {
    fn score(&mut self, _reference: &[u8], _candidate: &[u8], phase: MatchPhase) -> i16 {
        self.phases.push(phase);
        self.scores.pop_front().unwrap_or(0)
    }

    fn public_data<'a>(&self, reference: &'a [u8]) -> &'a [u8] {
        &reference[..reference.len().min(2)]
    }
}

fn enrolled(card: &mut CardRuntime, try_limit: u8, scores: &[i16]) -> StoredTemplate<ScriptedMatcher> {
    let mut template = StoredTemplate::new(
        card,
        bio_type::FINGERPRINT,
        try_limit,
        ScriptedMatcher::new(scores),
    )
    .expect("template should allocate");
    template.init(&[1, 2]).expect("init should succeed");
    template.update(&[3, 4]).expect("update should succeed");
    template.do_final().expect("do_final should succeed");

    template
}

#[test]
fn scores_classify_against_the_success_threshold() {
    assert_eq!(
        MatchOutcome::from_score(MINIMUM_SUCCESSFUL_MATCH_SCORE).expect("valid"),
        MatchOutcome::Success { score: 16384 }
    );
    assert_eq!(
        MatchOutcome::from_score(16383).expect("valid"),
        MatchOutcome::Failure { score: 16383 }
    );
    assert_eq!(
        MatchOutcome::from_score(MATCH_NEEDS_MORE_DATA).expect("valid"),
        MatchOutcome::NeedsMoreData
    );

    let err = MatchOutcome::from_score(-2).expect_err("negative score is invalid");
    assert_eq!(err.reason_code(), BioReason::InvalidData as u16);
}

#[test]
fn matching_before_enrolment_reports_no_templates() {
    let mut card = CardRuntime::default();
    let mut template = StoredTemplate::new(
        &mut card,
        bio_type::IRIS_SCAN,
        3,
        ScriptedMatcher::new(&[]),
    )
    .expect("template should allocate");

    let err = template
        .init_match(&mut card, &[0])
        .expect_err("uninitialized template cannot match");

    assert_eq!(err.class, ErrorClass::Bio);
    assert_eq!(err.reason_code(), BioReason::NoTemplatesEnrolled as u16);
    assert!(!template.is_initialized());
}

#[test]
fn enrolment_requires_init_and_non_empty_data() {
    let mut card = CardRuntime::default();
    let mut template = StoredTemplate::new(&mut card, bio_type::PASSWORD, 3, ScriptedMatcher::new(&[]))
        .expect("template should allocate");

    let err = template.update(&[1]).expect_err("update before init");
    assert_eq!(err.reason_code(), BioReason::IllegalUse as u16);

    template.init(&[]).expect("init should succeed");
    let err = template.do_final().expect_err("empty enrolment");
    assert_eq!(err.reason_code(), BioReason::InvalidData as u16);
    assert!(!template.is_initialized());
}

#[test]
fn failed_match_spends_a_try_and_success_restores_the_limit() {
    let mut card = CardRuntime::default();
    let mut template = enrolled(&mut card, 3, &[100, 20_000]);

    template.init_match(&mut card, &[9]).expect("match should run");
    assert!(!template.is_validated());
    assert_eq!(template.tries_remaining(&card).expect("tries"), 2);

    template.init_match(&mut card, &[1]).expect("match should run");
    assert!(template.is_validated());
    assert_eq!(template.tries_remaining(&card).expect("tries"), 3);

    template.reset();
    assert!(!template.is_validated());
}

#[test]
fn try_counter_survives_transaction_abort() {
    let mut card = CardRuntime::default();
    let mut template = enrolled(&mut card, 2, &[0]);

    card.begin_transaction().expect("begin should succeed");
    template.init_match(&mut card, &[9]).expect("match should run");
    card.abort_transaction().expect("abort should succeed");

    assert_eq!(template.tries_remaining(&card).expect("tries"), 1);
    assert_eq!(
        card.raw_bytes(template.counter_array()).expect("counter bytes"),
        vec![2, 1]
    );
}

#[test]
fn blocked_template_fails_without_consulting_the_matcher() {
    let mut card = CardRuntime::default();
    let mut template = enrolled(&mut card, 1, &[0, 20_000]);

    assert_eq!(template.init_match(&mut card, &[9]).expect("match"), 0);
    assert_eq!(template.tries_remaining(&card).expect("tries"), 0);

    // Matcher still holds the success score; a blocked template never asks.
    assert_eq!(template.init_match(&mut card, &[1]).expect("match"), 0);
    assert_eq!(template.matcher().phases.len(), 1);

    template
        .reset_unblock_and_set_try_limit(&mut card, 5)
        .expect("unblock should succeed");
    assert_eq!(template.tries_remaining(&card).expect("tries"), 5);
    assert_eq!(template.init_match(&mut card, &[1]).expect("match"), 20_000);
}

#[test]
fn multi_step_match_continues_only_inside_a_session() {
    let mut card = CardRuntime::default();
    let mut template = enrolled(&mut card, 3, &[MATCH_NEEDS_MORE_DATA, 16_384]);

    let err = template
        .match_data(&mut card, &[0])
        .expect_err("no session yet");
    assert_eq!(err.reason_code(), BioReason::IllegalUse as u16);

    assert_eq!(
        template.init_match(&mut card, &[1]).expect("match"),
        MATCH_NEEDS_MORE_DATA
    );
    assert_eq!(template.match_data(&mut card, &[2]).expect("match"), 16_384);
    assert!(template.is_validated());
    assert_eq!(
        template.matcher().phases,
        vec![MatchPhase::Initial, MatchPhase::Continuation]
    );
}

#[test]
fn public_template_data_is_copied_from_offset() {
    let mut card = CardRuntime::default();
    let template = enrolled(&mut card, 3, &[]);

    let mut dest = [0u8; 4];
    let copied = template
        .public_template_data(1, &mut dest)
        .expect("public data should be readable");

    assert_eq!(copied, 1);
    assert_eq!(dest, [2, 0, 0, 0]);
    assert_eq!(template.version(), [1, 0, 0]);
    assert_eq!(template.bio_type(), bio_type::FINGERPRINT);

    let err = template
        .public_template_data(3, &mut dest)
        .expect_err("offset beyond public data");
    assert_eq!(err.reason_code(), BioReason::IllegalValue as u16);
}

#[test]
fn zero_try_limit_is_rejected() {
    let mut card = CardRuntime::default();

    let err = StoredTemplate::new(&mut card, bio_type::SIGNATURE, 0, ScriptedMatcher::new(&[]))
        .err()
        .expect("zero limit should be rejected");

    assert_eq!(err.reason_code(), BioReason::IllegalValue as u16);
}
