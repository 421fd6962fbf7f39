// Unit tests for transcript aggregation: per-speaker turn buffers, live
// display lines, and the durable turn list.

use talentrial_session::{FragmentKind, Speaker, TranscriptAggregator, TranscriptFragment};

fn partial(speaker: Speaker, text: &str) -> TranscriptFragment {
    TranscriptFragment {
        speaker,
        kind: FragmentKind::Partial,
        text: text.to_string(),
    }
}

fn fin(speaker: Speaker, text: &str) -> TranscriptFragment {
    TranscriptFragment {
        speaker,
        kind: FragmentKind::Final,
        text: text.to_string(),
    }
}

#[test]
fn partial_publishes_live_line_without_touching_buffer() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(partial(Speaker::Candidate, "Hel"));
    assert_eq!(agg.live_line(Speaker::Candidate), "Hel");

    agg.ingest(partial(Speaker::Candidate, "Hello th"));
    assert_eq!(agg.live_line(Speaker::Candidate), "Hello th");

    // Nothing was finalized, so the transcript is still empty.
    assert!(agg.turns().is_empty());
}

#[test]
fn final_accumulates_into_the_turn() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(fin(Speaker::Agent, "Welcome to the interview."));
    agg.ingest(fin(Speaker::Agent, "Let's begin."));

    // A turn can hold several finalized sentences; the live line shows the
    // whole growing turn.
    assert_eq!(
        agg.live_line(Speaker::Agent),
        "Welcome to the interview. Let's begin."
    );
    assert_eq!(agg.turns().len(), 1);
    assert_eq!(agg.turns()[0].text, "Welcome to the interview. Let's begin.");
    assert_eq!(agg.turns()[0].speaker, Speaker::Agent);
}

#[test]
fn partial_overlays_finalized_sentences() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(fin(Speaker::Candidate, "I worked on billing."));
    agg.ingest(partial(Speaker::Candidate, "Then I"));

    assert_eq!(
        agg.live_line(Speaker::Candidate),
        "I worked on billing. Then I"
    );

    agg.ingest(fin(Speaker::Candidate, "Then I moved to infra."));
    assert_eq!(
        agg.live_line(Speaker::Candidate),
        "I worked on billing. Then I moved to infra."
    );
}

#[test]
fn buffer_clears_when_speaker_changes() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(fin(Speaker::Agent, "First question."));
    agg.ingest(fin(Speaker::Candidate, "My answer."));
    // The agent speaks again: their old buffer must not leak into this turn.
    agg.ingest(partial(Speaker::Agent, "Second"));

    assert_eq!(agg.live_line(Speaker::Agent), "Second");

    agg.ingest(fin(Speaker::Agent, "Second question."));
    assert_eq!(agg.live_line(Speaker::Agent), "Second question.");
}

#[test]
fn turns_are_ordered_with_increasing_sequence() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(fin(Speaker::Agent, "Hello."));
    agg.ingest(fin(Speaker::Candidate, "Hi."));
    agg.ingest(fin(Speaker::Candidate, "Glad to be here."));
    agg.ingest(fin(Speaker::Agent, "Great."));

    let turns = agg.turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].text, "Hello.");
    assert_eq!(turns[1].text, "Hi. Glad to be here.");
    assert_eq!(turns[2].text, "Great.");
    assert_eq!(turns[0].turn_sequence, 0);
    assert_eq!(turns[1].turn_sequence, 1);
    assert_eq!(turns[2].turn_sequence, 2);
}

#[test]
fn duplicate_final_is_dropped() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(fin(Speaker::Candidate, "Hello"));
    agg.ingest(fin(Speaker::Candidate, "Hello"));

    assert_eq!(agg.live_line(Speaker::Candidate), "Hello");
    assert_eq!(agg.turns().len(), 1);
    assert_eq!(agg.turns()[0].text, "Hello");
}

#[test]
fn same_text_from_other_speaker_is_not_a_duplicate() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(fin(Speaker::Agent, "Okay"));
    agg.ingest(fin(Speaker::Candidate, "Okay"));

    assert_eq!(agg.turns().len(), 2);
}

#[test]
fn repeated_sentence_later_in_the_turn_is_kept() {
    let mut agg = TranscriptAggregator::new();

    // Only an exact repeat of the immediately preceding final is suppressed.
    agg.ingest(fin(Speaker::Candidate, "Yes."));
    agg.ingest(fin(Speaker::Candidate, "I think so."));
    agg.ingest(fin(Speaker::Candidate, "Yes."));

    assert_eq!(agg.turns()[0].text, "Yes. I think so. Yes.");
}

#[test]
fn scenario_partial_then_final_single_turn() {
    let mut agg = TranscriptAggregator::new();

    agg.ingest(partial(Speaker::Candidate, "Hel"));
    agg.ingest(fin(Speaker::Candidate, "Hello"));

    assert_eq!(agg.live_line(Speaker::Candidate), "Hello");
    let turns = agg.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].speaker, Speaker::Candidate);
    assert_eq!(turns[0].text, "Hello");
}
