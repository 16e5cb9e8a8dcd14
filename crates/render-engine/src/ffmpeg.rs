//! Lowering of a [`RenderPlan`] to an ffmpeg invocation.
//!
//! Every placement becomes its own input and filter chain. Chains are joined
//! with `xfade` where the plan has a crossfade and `concat` elsewhere, then the
//! whole-video steps (tail padding, fades, overlay, captions) run on the
//! joined stream. Audio inputs are fitted, optionally ducked, and mixed.

use std::path::Path;

use stove_common::error::{StoveError, StoveResult};
use stove_common::timecode::format_secs;
use stove_project_model::asset::MediaKind;
use stove_project_model::audio::{AudioRole, TrackFit};
use stove_project_model::config::{CaptionStyle, FitMode, HorizontalAlign, OverlayBlend, VerticalAlign};
use stove_project_model::hardware::EncodeBackend;
use stove_project_model::plan::{
    EncodeParameters, FadeDirection, MixInput, Motion, RateControl, RenderOperation, RenderPlan,
};

/// Per-frame zoom step of the Ken Burns effect.
const ZOOM_STEP: f64 = 0.0015;
/// Maximum zoom of the Ken Burns effect.
const ZOOM_MAX: f64 = 1.2;
/// Extra room a panned image is scaled up by before cropping.
const PAN_HEADROOM: f64 = 1.2;

/// A ready-to-spawn ffmpeg argument vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegCommand {
    pub args: Vec<String>,
    pub total_frames: u64,
    pub expected_duration_secs: f64,
}

/// Lower a plan to ffmpeg arguments writing to `output`.
pub fn build_command(plan: &RenderPlan, output: &Path) -> StoveResult<FfmpegCommand> {
    let encode = plan
        .encode()
        .ok_or_else(|| StoveError::render("render plan has no terminal encode operation"))?;

    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut graph = Vec::new();
    let mut input_index = 0usize;
    let mut next_input = |args: &mut Vec<String>, pre: Vec<String>, path: &Path| {
        args.extend(pre);
        args.push("-i".to_string());
        args.push(path.display().to_string());
        let index = input_index;
        input_index += 1;
        index
    };

    // Placements.
    let mut clips = Vec::new();
    for op in &plan.operations {
        if let RenderOperation::Scale {
            position,
            source,
            kind,
            duration,
            ..
        } = op
        {
            let pre = match kind {
                MediaKind::Image => vec![
                    "-loop".to_string(),
                    "1".to_string(),
                    "-framerate".to_string(),
                    encode.fps.to_string(),
                    "-t".to_string(),
                    format_secs(*duration),
                ],
                MediaKind::Video { .. } => Vec::new(),
            };
            let input = next_input(&mut args, pre, source.as_path());
            graph.push(format!(
                "[{input}:v]{chain}[v{position}]",
                chain = scale_chain(op, encode)
            ));
            clips.push((*position, *duration));
        }
    }
    if clips.is_empty() {
        return Err(StoveError::render("render plan has no scale operations"));
    }

    // Join placements.
    let mut current = format!("[v{}]", clips[0].0);
    for (step, (position, _)) in clips.iter().enumerate().skip(1) {
        let label = format!("[j{step}]");
        let crossfade = plan.operations.iter().find_map(|op| match op {
            RenderOperation::Crossfade { to, start, duration, .. } if to == position => {
                Some((*start, *duration))
            }
            _ => None,
        });
        let join = match crossfade {
            Some((start, duration)) => format!(
                "{current}[v{position}]xfade=transition=fade:duration={}:offset={}{label}",
                format_secs(duration),
                format_secs(start)
            ),
            None => format!("{current}[v{position}]concat=n=2:v=1:a=0{label}"),
        };
        graph.push(join);
        current = label;
    }

    // Whole-video steps.
    let mut post = Vec::new();
    for op in &plan.operations {
        match op {
            RenderOperation::PadTail { duration, .. } => post.push(format!(
                "tpad=stop_mode=add:stop_duration={}:color=black",
                format_secs(*duration)
            )),
            RenderOperation::Fade {
                direction,
                start,
                duration,
            } => post.push(format!(
                "fade=t={}:st={}:d={}",
                match direction {
                    FadeDirection::In => "in",
                    FadeDirection::Out => "out",
                },
                format_secs(*start),
                format_secs(*duration)
            )),
            _ => {}
        }
    }
    if !post.is_empty() {
        graph.push(format!("{current}{}[base]", post.join(",")));
        current = "[base]".to_string();
    }

    for op in &plan.operations {
        if let RenderOperation::Overlay {
            source,
            opacity,
            blend,
            ..
        } = op
        {
            let input = next_input(
                &mut args,
                vec!["-stream_loop".to_string(), "-1".to_string()],
                source.as_path(),
            );
            graph.push(overlay_chain(&current, input, *opacity, *blend, encode));
            current = "[ovl]".to_string();
        }
    }

    let captions: Vec<String> = plan
        .operations
        .iter()
        .filter_map(|op| match op {
            RenderOperation::CaptionOverlay { start, end, text, .. } => {
                plan.caption_style.as_ref().map(|style| drawtext(text, *start, *end, style))
            }
            _ => None,
        })
        .collect();
    if !captions.is_empty() {
        graph.push(format!("{current}{}[capt]", captions.join(",")));
        current = "[capt]".to_string();
    }
    graph.push(format!("{current}null[vout]"));

    // Audio.
    let mut has_audio = false;
    for op in &plan.operations {
        if let RenderOperation::AudioMix {
            inputs,
            duration,
            ducking_ratio,
        } = op
        {
            let mut labels = Vec::with_capacity(inputs.len());
            for (slot, input) in inputs.iter().enumerate() {
                let index = next_input(&mut args, audio_input_args(input), input.path.as_path());
                graph.push(format!(
                    "[{index}:a]{chain}[a{slot}]",
                    chain = audio_chain(input, *duration)
                ));
                labels.push((input.role, format!("[a{slot}]")));
            }
            graph.push(audio_mix(&labels, *ducking_ratio));
            has_audio = true;
        }
    }

    args.push("-filter_complex".to_string());
    args.push(graph.join(";"));
    args.push("-map".to_string());
    args.push("[vout]".to_string());
    if has_audio {
        args.push("-map".to_string());
        args.push("[aout]".to_string());
    } else {
        args.push("-an".to_string());
    }
    args.push("-r".to_string());
    args.push(encode.fps.to_string());
    args.push("-t".to_string());
    args.push(format_secs(encode.duration_secs));
    args.append(&mut codec_args(encode));
    args.push(output.display().to_string());

    tracing::debug!(
        inputs = input_index,
        filters = graph.len(),
        args_len = args.len(),
        "Lowered render plan to ffmpeg"
    );

    Ok(FfmpegCommand {
        args,
        total_frames: encode.total_frames,
        expected_duration_secs: encode.duration_secs,
    })
}

/// Filter chain normalizing one placement to the output frame.
fn scale_chain(op: &RenderOperation, encode: &EncodeParameters) -> String {
    let RenderOperation::Scale {
        kind,
        duration,
        width,
        height,
        fit,
        playback_rate,
        trim_secs,
        motion,
        ..
    } = op
    else {
        return "null".to_string();
    };

    let mut chain = Vec::new();
    if kind.is_video() {
        if (*playback_rate - 1.0).abs() > f64::EPSILON {
            chain.push(format!("setpts=PTS/{playback_rate:.6}"));
        }
        chain.push(format!(
            "trim=duration={},setpts=PTS-STARTPTS",
            format_secs(trim_secs.unwrap_or(*duration))
        ));
    }

    chain.push(match fit {
        FitMode::Pad => format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"
        ),
        FitMode::Crop => format!(
            "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height}"
        ),
    });

    if let Some(motion) = motion {
        chain.push(motion_filter(*motion, *width, *height, *duration, encode.fps));
    }

    chain.push(format!("fps={},format=yuv420p,setsar=1", encode.fps));
    if !kind.is_video() {
        // zoompan emits `d` frames per looped input frame; bound the clip.
        chain.push(format!(
            "trim=duration={},setpts=PTS-STARTPTS",
            format_secs(*duration)
        ));
    }
    chain.join(",")
}

/// Ken Burns zoom or crop-window pan over `duration` seconds.
pub fn motion_filter(motion: Motion, width: u32, height: u32, duration: f64, fps: u32) -> String {
    let frames = (duration * fps as f64).ceil().max(1.0) as u64;
    let dur = format_secs(duration);
    let zoom = |expr: String| {
        format!(
            "scale={w2}:{h2},zoompan=z='{expr}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:fps={fps}:s={w2}x{h2},scale={width}:{height}",
            w2 = width * 2,
            h2 = height * 2,
        )
    };
    let pan = |x: String, y: String| {
        let w = even(width as f64 * PAN_HEADROOM);
        let h = even(height as f64 * PAN_HEADROOM);
        format!("scale={w}:{h},crop={width}:{height}:x='{x}':y='{y}'")
    };

    match motion {
        Motion::ZoomIn => zoom(format!("min(zoom+{ZOOM_STEP},{ZOOM_MAX})")),
        Motion::ZoomOut => zoom(format!(
            "if(eq(on,0),{ZOOM_MAX},max(zoom-{ZOOM_STEP},1.0))"
        )),
        Motion::PanRight => pan(format!("(iw-ow)*t/{dur}"), "(ih-oh)/2".to_string()),
        Motion::PanLeft => pan(format!("(iw-ow)*(1-t/{dur})"), "(ih-oh)/2".to_string()),
        Motion::PanDown => pan("(iw-ow)/2".to_string(), format!("(ih-oh)*t/{dur}")),
        Motion::PanUp => pan("(iw-ow)/2".to_string(), format!("(ih-oh)*(1-t/{dur})")),
    }
}

fn even(value: f64) -> u32 {
    let rounded = value.round() as u32;
    rounded + rounded % 2
}

fn overlay_chain(
    base: &str,
    input: usize,
    opacity: f64,
    blend: OverlayBlend,
    encode: &EncodeParameters,
) -> String {
    let (w, h) = (encode.width, encode.height);
    match blend {
        OverlayBlend::Simple => format!(
            "[{input}:v]scale={w}:{h},format=yuva420p,colorchannelmixer=aa={opacity:.3}[ovl_src];{base}[ovl_src]overlay=shortest=1,format=yuv420p[ovl]"
        ),
        OverlayBlend::Screen => format!(
            "[{input}:v]scale={w}:{h},format=yuv420p,setsar=1[ovl_src];{base}[ovl_src]blend=all_mode=screen:all_opacity={opacity:.3}:shortest=1[ovl]"
        ),
    }
}

/// `drawtext` filter for one caption, enabled only within its interval.
pub fn drawtext(text: &str, start: f64, end: f64, style: &CaptionStyle) -> String {
    let x = match style.horizontal {
        HorizontalAlign::Left => style.margin_horizontal.to_string(),
        HorizontalAlign::Center => "(w-text_w)/2".to_string(),
        HorizontalAlign::Right => format!("w-text_w-{}", style.margin_horizontal),
    };
    let y = match style.vertical {
        VerticalAlign::Top => style.margin_vertical.to_string(),
        VerticalAlign::Center => "(h-text_h)/2".to_string(),
        VerticalAlign::Bottom => format!("h-text_h-{}", style.margin_vertical),
    };

    format!(
        "drawtext=text='{text}':font='{font}':fontsize={size}:fontcolor={color}:borderw={border}:bordercolor={outline}:x={x}:y={y}:enable='between(t,{start},{end})'",
        text = escape_drawtext(text),
        font = escape_drawtext(&style.font_family),
        size = style.font_size,
        color = ffmpeg_color(&style.text_color),
        border = style.outline_width,
        outline = ffmpeg_color(&style.outline_color),
        start = format_secs(start),
        end = format_secs(end),
    )
}

/// Escape text for a single-quoted `drawtext` option.
///
/// Single quotes cannot appear inside a quoted filter value, so they are
/// replaced with a typographic apostrophe.
pub fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push('\u{2019}'),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\%"),
            '\n' | '\r' => escaped.push(' '),
            other => escaped.push(other),
        }
    }
    escaped
}

/// `#RRGGBB` to ffmpeg's `0xRRGGBB`. Unparseable colors become white.
fn ffmpeg_color(hex: &str) -> String {
    let digits = hex.trim_start_matches('#');
    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        format!("0x{}", digits.to_ascii_uppercase())
    } else {
        "0xFFFFFF".to_string()
    }
}

fn audio_input_args(input: &MixInput) -> Vec<String> {
    match input.fit {
        TrackFit::Loop { loops, .. } if loops > 1 => {
            vec!["-stream_loop".to_string(), (loops - 1).to_string()]
        }
        _ => Vec::new(),
    }
}

fn audio_chain(input: &MixInput, duration: f64) -> String {
    let fit = match input.fit {
        TrackFit::AsIs => format!("atrim=duration={}", format_secs(duration)),
        TrackFit::Trim { to_secs } | TrackFit::Loop { to_secs, .. } => {
            format!("atrim=duration={}", format_secs(to_secs))
        }
        TrackFit::PadSilence { to_secs } => format!("apad=whole_dur={}", format_secs(to_secs)),
    };
    format!("volume={:.3},{fit},asetpts=PTS-STARTPTS", input.volume)
}

fn audio_mix(labels: &[(AudioRole, String)], ducking_ratio: Option<f64>) -> String {
    let narration = labels.iter().find(|(role, _)| *role == AudioRole::Narration);
    let background = labels.iter().find(|(role, _)| *role == AudioRole::Background);

    match (labels, narration, background, ducking_ratio) {
        ([(_, only)], _, _, _) => format!("{only}anull[aout]"),
        (_, Some((_, voice)), Some((_, music)), Some(ratio)) => format!(
            "{voice}asplit=2[voice_mix][voice_key];{music}[voice_key]sidechaincompress=threshold=0.05:ratio=8:mix={ratio:.3}[music_ducked];[voice_mix][music_ducked]amix=inputs=2:duration=first:dropout_transition=2:normalize=0[aout]"
        ),
        _ => {
            let joined: String = labels.iter().map(|(_, label)| label.as_str()).collect();
            format!(
                "{joined}amix=inputs={}:duration=first:dropout_transition=2:normalize=0[aout]",
                labels.len()
            )
        }
    }
}

/// AMF `-quality` value for an x264-style speed preset.
///
/// AMF only knows `speed`, `balanced` and `quality`; anything else passes
/// through unchanged.
pub fn amf_quality(preset: &str) -> &str {
    match preset {
        "ultrafast" | "superfast" | "veryfast" | "faster" | "fast" => "speed",
        "medium" => "balanced",
        "slow" | "slower" | "veryslow" | "placebo" => "quality",
        other => other,
    }
}

/// Encoder arguments for the plan's backend.
pub fn codec_args(encode: &EncodeParameters) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), encode.encoder.clone()];

    match encode.backend {
        EncodeBackend::Vce => {
            args.push("-quality".to_string());
            args.push(amf_quality(&encode.preset).to_string());
        }
        EncodeBackend::Cpu | EncodeBackend::Nvenc | EncodeBackend::QuickSync => {
            args.push("-preset".to_string());
            args.push(encode.preset.clone());
        }
    }

    match (encode.rate_control, encode.backend) {
        (RateControl::Crf(crf), _) => {
            args.push("-crf".to_string());
            args.push(crf.to_string());
        }
        (RateControl::Bitrate(kbps), EncodeBackend::Vce) => {
            args.push("-rc".to_string());
            args.push("cbr".to_string());
            args.push("-b:v".to_string());
            args.push(format!("{kbps}k"));
        }
        (RateControl::Bitrate(kbps), _) => {
            args.push("-b:v".to_string());
            args.push(format!("{kbps}k"));
        }
    }

    args.extend([
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        encode.audio_codec.clone(),
        "-b:a".to_string(),
        format!("{}k", encode.audio_bitrate_kbps),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args
}
