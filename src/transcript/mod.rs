//! Transcript aggregation
//!
//! Turns the raw partial/final speech-recognition fragments delivered by the
//! voice transport into:
//! - two continuously updated "current line" strings (one per speaker), and
//! - a durable, ordered list of finished turns for later display.

use serde::{Deserialize, Serialize};

/// Who produced a fragment or turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The AI interviewer.
    Agent,
    /// The human candidate.
    Candidate,
}

/// Whether a fragment is a provisional or finalized recognition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Partial,
    Final,
}

/// A single speech-recognition update from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub speaker: Speaker,
    pub kind: FragmentKind,
    pub text: String,
}

/// One finished span of uninterrupted speech by a single speaker.
///
/// Append-only: a turn accumulates finalized sentences until the other
/// speaker starts, and is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub text: String,
    pub turn_sequence: u32,
}

/// Accumulates fragments into per-speaker turn buffers and the full transcript.
///
/// Recognition results arrive sentence-by-sentence; one turn can contain
/// several finalized sentences before the other speaker starts. The live
/// line for a speaker is their whole growing turn, overlaid with the
/// in-progress partial text mid-sentence.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    agent_buffer: String,
    candidate_buffer: String,
    agent_line: String,
    candidate_line: String,
    last_speaker: Option<Speaker>,
    /// The previously accepted final fragment, for re-delivery suppression.
    last_final: Option<(Speaker, String)>,
    turns: Vec<TranscriptTurn>,
    /// Index into `turns` of the turn currently being accumulated, if any.
    open_turn: Option<usize>,
    next_turn_sequence: u32,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment through the aggregator, updating the live line for
    /// its speaker and, for finals, the durable transcript.
    pub fn ingest(&mut self, fragment: TranscriptFragment) {
        let speaker = fragment.speaker;

        // A fragment from a speaker other than the last one means the other
        // speaker's turn just ended conversationally: this speaker's stale
        // buffer from their previous turn is cleared and a new turn begins.
        if self.last_speaker != Some(speaker) {
            self.buffer_mut(speaker).clear();
            self.last_speaker = Some(speaker);
            self.open_turn = None;
        }

        match fragment.kind {
            FragmentKind::Partial => {
                // Overlay the in-progress text on the finalized sentences of
                // the current turn. Does not touch the buffer itself.
                let buffer = self.buffer(speaker);
                let line = if buffer.is_empty() {
                    fragment.text
                } else {
                    format!("{} {}", buffer, fragment.text)
                };
                *self.line_mut(speaker) = line;
            }
            FragmentKind::Final => {
                // The transport can re-deliver the same finalized fragment;
                // an exact repeat of the previous final is dropped.
                if let Some((last_speaker, last_text)) = &self.last_final {
                    if *last_speaker == speaker && *last_text == fragment.text {
                        return;
                    }
                }

                {
                    let buffer = self.buffer_mut(speaker);
                    if buffer.is_empty() {
                        *buffer = fragment.text.clone();
                    } else if !fragment.text.is_empty() {
                        buffer.push(' ');
                        buffer.push_str(&fragment.text);
                    }
                }
                let line = self.buffer(speaker).to_string();
                *self.line_mut(speaker) = line;

                match self.open_turn {
                    Some(index) => {
                        let turn = &mut self.turns[index];
                        if !fragment.text.is_empty() {
                            if !turn.text.is_empty() {
                                turn.text.push(' ');
                            }
                            turn.text.push_str(&fragment.text);
                        }
                    }
                    None => {
                        self.turns.push(TranscriptTurn {
                            speaker,
                            text: fragment.text.clone(),
                            turn_sequence: self.next_turn_sequence,
                        });
                        self.next_turn_sequence += 1;
                        self.open_turn = Some(self.turns.len() - 1);
                    }
                }

                self.last_final = Some((speaker, fragment.text));
            }
        }
    }

    /// The published display line for a speaker.
    pub fn live_line(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::Agent => &self.agent_line,
            Speaker::Candidate => &self.candidate_line,
        }
    }

    /// The full ordered transcript accumulated so far.
    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    fn buffer(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::Agent => &self.agent_buffer,
            Speaker::Candidate => &self.candidate_buffer,
        }
    }

    fn buffer_mut(&mut self, speaker: Speaker) -> &mut String {
        match speaker {
            Speaker::Agent => &mut self.agent_buffer,
            Speaker::Candidate => &mut self.candidate_buffer,
        }
    }

    fn line_mut(&mut self, speaker: Speaker) -> &mut String {
        match speaker {
            Speaker::Agent => &mut self.agent_line,
            Speaker::Candidate => &mut self.candidate_line,
        }
    }
}
