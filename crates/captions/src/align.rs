//! Caption alignment onto the reconciled timeline.
//!
//! # Algorithm
//!
//! 1. **Validate** raw segment timing.
//! 2. **Map** timestamps onto the final clock, repeating them for every
//!    narration loop.
//! 3. **Lay out** captions according to the configured [`CaptionMode`].
//! 4. **Limit** each caption to the configured maximum duration and clip the
//!    set to the final duration.
//! 5. **Normalize**: sort, remove overlaps, keep the minimum gap, and drop
//!    captions left with no duration.

use std::cmp::Ordering;

use stove_common::error::{StoveError, StoveResult};
use stove_common::timecode::TIME_EPSILON;
use stove_project_model::audio::ReconciledTimeline;
use stove_project_model::caption::{CaptionSegment, RawSegment, RawWord};
use stove_project_model::config::{AudioSyncPolicy, CaptionConfig, CaptionMode};

/// Consecutive line captions separated by a longer pause are never merged.
pub const MERGE_GAP_SECS: f64 = 1.0;

/// Mapping from the transcribed audio clock to the final clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionClock {
    /// Multiplier applied to every timestamp.
    pub factor: f64,
    /// Narration length, used as the offset between repetitions.
    pub period: f64,
    /// Times the transcript is laid down back to back.
    pub repeats: u32,
}

impl CaptionClock {
    pub fn identity() -> Self {
        Self {
            factor: 1.0,
            period: 0.0,
            repeats: 1,
        }
    }

    /// Clock for a reconciled timeline.
    ///
    /// Audio-referenced policies keep the narration at its natural speed, so
    /// the factor is `final / reference` (1 after reconciliation). A looped
    /// narration repeats its captions once per loop.
    pub fn for_timeline(reconciled: &ReconciledTimeline) -> Self {
        let r = &reconciled.reconciliation;
        let Some(reference) = r.reference_audio_secs.filter(|secs| *secs > 0.0) else {
            return Self::identity();
        };

        match r.policy {
            AudioSyncPolicy::MatchAudio => Self {
                factor: r.final_duration / reference,
                ..Self::identity()
            },
            AudioSyncPolicy::MatchVisual if r.narration_loops > 1 => Self {
                factor: 1.0,
                period: reference,
                repeats: r.narration_loops,
            },
            _ => Self::identity(),
        }
    }

    fn map(&self, secs: f64, repeat: u32) -> f64 {
        secs * self.factor + self.period * repeat as f64
    }

    /// Map every segment, in order, once per repetition.
    pub fn map_segments(&self, segments: &[RawSegment]) -> Vec<RawSegment> {
        (0..self.repeats)
            .flat_map(|repeat| {
                segments.iter().map(move |segment| RawSegment {
                    start: self.map(segment.start, repeat),
                    end: self.map(segment.end, repeat),
                    text: segment.text.clone(),
                    words: segment
                        .words
                        .iter()
                        .map(|w| RawWord {
                            text: w.text.clone(),
                            start: self.map(w.start, repeat),
                            end: self.map(w.end, repeat),
                        })
                        .collect(),
                })
            })
            .collect()
    }
}

/// Align raw transcription segments to the final timeline.
pub fn align_captions(
    reconciled: &ReconciledTimeline,
    segments: &[RawSegment],
    config: &CaptionConfig,
) -> StoveResult<Vec<CaptionSegment>> {
    validate_segments(segments)?;

    let clock = CaptionClock::for_timeline(reconciled);
    let mapped = clock.map_segments(segments);

    let laid_out = match config.mode {
        CaptionMode::Lines => layout_lines(&mapped, config),
        CaptionMode::SingleWords => layout_single_words(&mapped),
        CaptionMode::WordChunks { words } => layout_word_chunks(&mapped, words, config),
        CaptionMode::Typewriter => layout_typewriter(&mapped, config),
    };

    let limited = apply_max_duration(laid_out, config.max_duration_secs);
    let clipped = clip_to_duration(limited, reconciled.final_duration());
    let captions = normalize(clipped, config.min_gap_secs);

    tracing::info!(
        segments = segments.len(),
        captions = captions.len(),
        mode = ?config.mode,
        clock_factor = clock.factor,
        repeats = clock.repeats,
        "Aligned captions"
    );

    Ok(captions)
}

/// Reject segments (or their words) with reversed or non-finite timing.
pub fn validate_segments(segments: &[RawSegment]) -> StoveResult<()> {
    for (index, segment) in segments.iter().enumerate() {
        let spans = std::iter::once((segment.start, segment.end))
            .chain(segment.words.iter().map(|w| (w.start, w.end)));
        for (start, end) in spans {
            if !start.is_finite() || !end.is_finite() || end < start {
                return Err(StoveError::CaptionTiming { index, start, end });
            }
        }
    }
    Ok(())
}

/// A timed word used while laying captions out.
#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    start: f64,
    end: f64,
}

impl Token {
    fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// How words are timed when the transcript has no word timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spacing {
    /// Every word gets the same share of the segment.
    Even,
    /// Shares are proportional to word length.
    ByLength,
}

fn tokens(segment: &RawSegment, spacing: Spacing) -> Vec<Token> {
    if !segment.words.is_empty() {
        return segment
            .words
            .iter()
            .filter(|w| !w.text.trim().is_empty())
            .map(|w| Token {
                text: w.text.trim().to_string(),
                start: w.start,
                end: w.end,
            })
            .collect();
    }

    let words: Vec<&str> = segment.text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let duration = segment.end - segment.start;
    let weights: Vec<f64> = match spacing {
        Spacing::Even => vec![1.0; words.len()],
        Spacing::ByLength => words.iter().map(|w| w.chars().count() as f64).collect(),
    };
    let total: f64 = weights.iter().sum();

    let mut cursor = segment.start;
    words
        .iter()
        .zip(weights)
        .enumerate()
        .map(|(i, (word, weight))| {
            let start = cursor;
            let end = if i + 1 == words.len() {
                segment.end
            } else {
                start + duration * weight / total
            };
            cursor = end;
            Token {
                text: (*word).to_string(),
                start,
                end,
            }
        })
        .collect()
}

fn caption_from(tokens: &[Token]) -> Option<CaptionSegment> {
    let first = tokens.first()?;
    let last = tokens.last()?;
    Some(CaptionSegment {
        start: first.start,
        end: last.end,
        text: joined(tokens),
        words: tokens
            .iter()
            .map(|t| RawWord {
                text: t.text.clone(),
                start: t.start,
                end: t.end,
            })
            .collect(),
    })
}

fn joined(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn joined_chars(tokens: &[Token]) -> usize {
    tokens.iter().map(Token::chars).sum::<usize>() + tokens.len().saturating_sub(1)
}

fn fits(chars: usize, duration: f64, max_chars: Option<usize>, max_duration: Option<f64>) -> bool {
    max_chars.map_or(true, |max| chars <= max)
        && max_duration.map_or(true, |max| duration <= max + TIME_EPSILON)
}

/// Greedily pack tokens into captions that respect both limits.
///
/// A single token that breaks a limit on its own becomes its own caption.
fn group_tokens(tokens: &[Token], max_chars: Option<usize>, max_duration: Option<f64>) -> Vec<CaptionSegment> {
    let mut captions = Vec::new();
    let mut current: Vec<Token> = Vec::new();

    for token in tokens {
        if let Some(first) = current.first() {
            let chars = joined_chars(&current) + 1 + token.chars();
            if !fits(chars, token.end - first.start, max_chars, max_duration) {
                captions.extend(caption_from(&current));
                current.clear();
            }
        }
        current.push(token.clone());
    }
    captions.extend(caption_from(&current));
    captions
}

fn layout_lines(segments: &[RawSegment], config: &CaptionConfig) -> Vec<CaptionSegment> {
    let mut pieces = Vec::new();

    for segment in segments {
        let text = segment.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }

        let chars = text.chars().count();
        if fits(chars, segment.end - segment.start, config.max_chars, config.max_duration_secs) {
            pieces.push(CaptionSegment {
                start: segment.start,
                end: segment.end,
                text,
                words: segment.words.clone(),
            });
        } else {
            let tokens = tokens(segment, Spacing::ByLength);
            pieces.extend(group_tokens(&tokens, config.max_chars, config.max_duration_secs));
        }
    }

    merge_lines(pieces, config)
}

/// Join consecutive short captions while the joined caption still fits.
///
/// Merging needs a character limit; without one every segment stays a
/// caption of its own.
fn merge_lines(pieces: Vec<CaptionSegment>, config: &CaptionConfig) -> Vec<CaptionSegment> {
    if config.max_chars.is_none() {
        return pieces;
    }

    let mut merged: Vec<CaptionSegment> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if let Some(last) = merged.last_mut() {
            let chars = last.text.chars().count() + 1 + piece.text.chars().count();
            let gap = piece.start - last.end;
            if (0.0..=MERGE_GAP_SECS).contains(&gap)
                && fits(chars, piece.end - last.start, config.max_chars, config.max_duration_secs)
            {
                last.text.push(' ');
                last.text.push_str(&piece.text);
                last.end = piece.end;
                last.words.extend(piece.words);
                continue;
            }
        }
        merged.push(piece);
    }
    merged
}

fn layout_single_words(segments: &[RawSegment]) -> Vec<CaptionSegment> {
    segments
        .iter()
        .flat_map(|segment| tokens(segment, Spacing::Even))
        .map(|token| CaptionSegment {
            start: token.start,
            end: token.end,
            text: token.text.to_uppercase(),
            words: vec![RawWord {
                text: token.text.to_uppercase(),
                start: token.start,
                end: token.end,
            }],
        })
        .collect()
}

fn layout_word_chunks(segments: &[RawSegment], words: usize, config: &CaptionConfig) -> Vec<CaptionSegment> {
    let size = words.max(1);
    segments
        .iter()
        .flat_map(|segment| {
            let tokens = tokens(segment, Spacing::Even);
            tokens
                .chunks(size)
                .flat_map(|chunk| group_tokens(chunk, config.max_chars, config.max_duration_secs))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Each word adds itself to the visible line; a line that would exceed the
/// character limit starts over with the new word.
fn layout_typewriter(segments: &[RawSegment], config: &CaptionConfig) -> Vec<CaptionSegment> {
    let mut captions = Vec::new();

    for segment in segments {
        let mut line: Vec<Token> = Vec::new();
        for token in tokens(segment, Spacing::Even) {
            if !line.is_empty() {
                let chars = joined_chars(&line) + 1 + token.chars();
                if !fits(chars, 0.0, config.max_chars, None) {
                    line.clear();
                }
            }
            line.push(token.clone());
            captions.push(CaptionSegment {
                start: token.start,
                end: token.end,
                text: joined(&line),
                words: Vec::new(),
            });
        }
    }
    captions
}

fn apply_max_duration(captions: Vec<CaptionSegment>, max_duration: Option<f64>) -> Vec<CaptionSegment> {
    let Some(max) = max_duration else {
        return captions;
    };
    captions
        .into_iter()
        .map(|mut caption| {
            if caption.duration() > max {
                caption.end = caption.start + max;
            }
            caption
        })
        .collect()
}

fn clip_to_duration(captions: Vec<CaptionSegment>, final_duration: f64) -> Vec<CaptionSegment> {
    let before = captions.len();
    let clipped: Vec<CaptionSegment> = captions
        .into_iter()
        .filter(|c| c.start < final_duration - TIME_EPSILON)
        .map(|mut c| {
            c.start = c.start.max(0.0);
            c.end = c.end.min(final_duration);
            c
        })
        .collect();

    if clipped.len() < before {
        tracing::debug!(
            dropped = before - clipped.len(),
            final_duration,
            "Dropped captions past the end of the video"
        );
    }
    clipped
}

/// Sort, remove overlaps, keep `min_gap` between captions, and drop empty ones.
///
/// The result is non-overlapping with strictly increasing starts.
pub fn normalize(mut captions: Vec<CaptionSegment>, min_gap: f64) -> Vec<CaptionSegment> {
    captions.retain(|c| !c.text.trim().is_empty() && c.duration() > TIME_EPSILON);
    captions.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));

    let mut out: Vec<CaptionSegment> = Vec::with_capacity(captions.len());
    for caption in captions {
        if let Some(prev) = out.last_mut() {
            if caption.start < prev.end + min_gap {
                prev.end = caption.start - min_gap;
                if prev.duration() <= TIME_EPSILON {
                    out.pop();
                }
            }
        }
        out.push(caption);
    }
    out
}
