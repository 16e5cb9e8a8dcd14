//! Subtitle generation in SRT, WebVTT, and karaoke ASS formats.

use std::path::Path;

use stove_common::error::StoveResult;
use stove_common::timecode::{format_ass_time, format_srt_time, format_vtt_time};
use stove_project_model::caption::CaptionSegment;
use stove_project_model::config::{CaptionStyle, HorizontalAlign, VerticalAlign};

/// Generate SRT subtitle content from aligned captions.
pub fn generate_srt(captions: &[CaptionSegment]) -> String {
    let mut output = String::new();

    for (i, caption) in captions.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(caption.start),
            format_srt_time(caption.end),
        ));
        output.push_str(&caption.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content from aligned captions.
pub fn generate_vtt(captions: &[CaptionSegment]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for caption in captions {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(caption.start),
            format_vtt_time(caption.end),
        ));
        output.push_str(&caption.text);
        output.push_str("\n\n");
    }

    output
}

/// Convert `#RRGGBB` to ASS `&H00BBGGRR`. Unparseable colors become white.
pub fn ass_color(hex: &str) -> String {
    let digits = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
    };
    match (digits.len(), channel(0..2), channel(2..4), channel(4..6)) {
        (6, Some(r), Some(g), Some(b)) => format!("&H00{b:02X}{g:02X}{r:02X}"),
        _ => "&H00FFFFFF".to_string(),
    }
}

/// Numpad-style ASS alignment for a caption position.
pub fn ass_alignment(style: &CaptionStyle) -> u8 {
    let row = match style.vertical {
        VerticalAlign::Bottom => 0,
        VerticalAlign::Center => 3,
        VerticalAlign::Top => 6,
    };
    let column = match style.horizontal {
        HorizontalAlign::Left => 1,
        HorizontalAlign::Center => 2,
        HorizontalAlign::Right => 3,
    };
    row + column
}

fn ass_header(style: &CaptionStyle) -> String {
    let primary = ass_color(&style.text_color);
    let outline = ass_color(&style.outline_color);
    let bold = if style.bold { -1 } else { 0 };
    let alignment = ass_alignment(style);

    format!(
        "[Script Info]\n\
         Title: VideoStove Captions\n\
         ScriptType: v4.00+\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Karaoke,{font},{size},{primary},&H0000FFFF,{outline},&H80000000,{bold},0,0,0,100,100,0,0,1,{outline_width},0,{alignment},{margin_h},{margin_h},{margin_v},1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        font = style.font_family,
        size = style.font_size,
        outline_width = style.outline_width,
        margin_h = style.margin_horizontal,
        margin_v = style.margin_vertical,
    )
}

/// Karaoke text: one `\k` tag (centiseconds) per word, clipped to the caption.
fn karaoke_text(caption: &CaptionSegment) -> String {
    if caption.words.is_empty() {
        let centis = (caption.duration() * 100.0).round().max(0.0) as u64;
        return format!("{{\\k{centis}}}{}", caption.text);
    }

    let mut cursor = caption.start;
    let mut parts = Vec::with_capacity(caption.words.len());
    for word in &caption.words {
        let end = word.end.min(caption.end).max(cursor);
        let centis = ((end - cursor) * 100.0).round() as u64;
        parts.push(format!("{{\\k{centis}}}{}", word.text.trim()));
        cursor = end;
    }
    parts.join(" ")
}

/// Generate an ASS script with word-level karaoke timing.
pub fn generate_ass(captions: &[CaptionSegment], style: &CaptionStyle) -> String {
    let mut output = ass_header(style);

    for caption in captions {
        output.push_str(&format!(
            "Dialogue: 0,{},{},Karaoke,,0,0,0,,{}\n",
            format_ass_time(caption.start),
            format_ass_time(caption.end),
            karaoke_text(caption),
        ));
    }

    output
}

/// Save subtitles to a file, choosing the format by extension.
pub fn save_subtitles(captions: &[CaptionSegment], style: &CaptionStyle, path: &Path) -> StoveResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let content = match extension.as_deref() {
        Some("vtt") => generate_vtt(captions),
        Some("ass") => generate_ass(captions, style),
        _ => generate_srt(captions), // default to SRT
    };
    std::fs::write(path, content)?;

    tracing::info!(
        path = %path.display(),
        captions = captions.len(),
        "Wrote subtitles"
    );
    Ok(())
}
