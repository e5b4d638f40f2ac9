//! Style-level transforms: filtering, font replacement, patches, rescale,
//! size multiplier.

use std::collections::BTreeMap;

use crate::logging::JobLogger;
use crate::models::{StyleFilterConfig, StyleFilterMode};

use super::types::{OperationStats, SubtitleData};

/// Keep or drop events by style name for a generated track.
///
/// `forced_include` always keeps, `forced_exclude` always drops, and the
/// mode decides the rest. Declared styles that match no event warn but do
/// not fail.
pub fn filter_by_styles(
    data: &mut SubtitleData,
    config: &StyleFilterConfig,
    logger: &JobLogger,
) -> OperationStats {
    let declared: Vec<&String> = config
        .styles
        .iter()
        .chain(&config.forced_include)
        .chain(&config.forced_exclude)
        .collect();
    let known = data.style_names();
    let missing: Vec<String> = declared
        .iter()
        .filter(|s| !known.contains(s))
        .map(|s| s.to_string())
        .collect();
    if !missing.is_empty() {
        logger.warn(&format!(
            "[Style Filter] Declared styles not found: {}",
            missing.join(", ")
        ));
    }

    let before = data.events.len();
    data.events.retain(|event| {
        if config.forced_include.contains(&event.style) {
            return true;
        }
        if config.forced_exclude.contains(&event.style) {
            return false;
        }
        let listed = config.styles.contains(&event.style);
        match config.mode {
            StyleFilterMode::Include => listed,
            StyleFilterMode::Exclude => !listed,
        }
    });
    let removed = before - data.events.len();

    let stats = OperationStats {
        events_affected: removed,
        summary: format!(
            "removed {} of {} events ({:?} mode, {} styles)",
            removed,
            before,
            config.mode,
            config.styles.len()
        ),
        styles_missing: missing,
    };
    logger.message(&format!("[SubtitleData] Style filter: {}", stats.summary));
    stats
}

/// Replace font names across styles.
pub fn apply_font_replacements(
    data: &mut SubtitleData,
    replacements: &BTreeMap<String, String>,
    logger: &JobLogger,
) -> OperationStats {
    let mut changed = 0usize;
    for style in &mut data.styles {
        let current = style.font_name().to_string();
        if let Some(new_font) = replacements.get(&current) {
            style.set("fontname", new_font.clone());
            changed += 1;
        }
    }
    let stats = OperationStats {
        events_affected: changed,
        summary: format!("replaced fonts in {} style(s)", changed),
        styles_missing: Vec::new(),
    };
    logger.message(&format!("[SubtitleData] Font replacement: {}", stats.summary));
    stats
}

/// Apply declarative per-style field overrides.
pub fn apply_style_patch(
    data: &mut SubtitleData,
    patch: &BTreeMap<String, BTreeMap<String, String>>,
    logger: &JobLogger,
) -> OperationStats {
    let mut changed = 0usize;
    for style in &mut data.styles {
        let name = style.name().to_string();
        if let Some(overrides) = patch.get(&name) {
            for (field, value) in overrides {
                if style.set(field, value.clone()) {
                    changed += 1;
                }
            }
        }
    }
    let stats = OperationStats {
        events_affected: changed,
        summary: format!("patched {} style field(s)", changed),
        styles_missing: Vec::new(),
    };
    logger.message(&format!("[SubtitleData] Style patch: {}", stats.summary));
    stats
}

/// Rescale PlayRes to the reference video dimensions, scaling geometry
/// fields proportionally.
pub fn apply_rescale(
    data: &mut SubtitleData,
    target: (u32, u32),
    logger: &JobLogger,
) -> OperationStats {
    let (target_w, target_h) = target;
    let (cur_w, cur_h) = data.play_res();
    let (Some(cur_w), Some(cur_h)) = (cur_w, cur_h) else {
        // No declared resolution; set the target and leave geometry alone.
        data.metadata_set("PlayResX", target_w.to_string());
        data.metadata_set("PlayResY", target_h.to_string());
        let stats = OperationStats {
            events_affected: 0,
            summary: format!("set PlayRes to {}x{} (no prior resolution)", target_w, target_h),
            styles_missing: Vec::new(),
        };
        logger.message(&format!("[SubtitleData] Rescale: {}", stats.summary));
        return stats;
    };

    if (cur_w, cur_h) == (target_w, target_h) {
        let stats = OperationStats {
            events_affected: 0,
            summary: format!("already at {}x{}", target_w, target_h),
            styles_missing: Vec::new(),
        };
        logger.message(&format!("[SubtitleData] Rescale: {}", stats.summary));
        return stats;
    }

    let scale_x = target_w as f64 / cur_w as f64;
    let scale_y = target_h as f64 / cur_h as f64;

    let mut changed = 0usize;
    for style in &mut data.styles {
        for field in ["fontsize", "outline", "shadow", "spacing", "marginv"] {
            changed += scale_numeric_field(style, field, scale_y);
        }
        for field in ["marginl", "marginr"] {
            changed += scale_numeric_field(style, field, scale_x);
        }
    }

    data.metadata_set("PlayResX", target_w.to_string());
    data.metadata_set("PlayResY", target_h.to_string());

    let stats = OperationStats {
        events_affected: changed,
        summary: format!(
            "rescaled {}x{} -> {}x{} ({} fields)",
            cur_w, cur_h, target_w, target_h, changed
        ),
        styles_missing: Vec::new(),
    };
    logger.message(&format!("[SubtitleData] Rescale: {}", stats.summary));
    stats
}

fn scale_numeric_field(
    style: &mut super::types::SubtitleStyle,
    field: &str,
    factor: f64,
) -> usize {
    if let Some(value) = style.get(field).and_then(|v| v.parse::<f64>().ok()) {
        style.set(field, format_number(value * factor));
        1
    } else {
        0
    }
}

/// Multiply every style's font size.
pub fn apply_size_multiplier(
    data: &mut SubtitleData,
    multiplier: f64,
    logger: &JobLogger,
) -> OperationStats {
    // Guard against nonsense values that would make subtitles unreadable.
    if !(0.5..=3.0).contains(&multiplier) {
        logger.warn(&format!(
            "[SubtitleData] Ignoring unreasonable size multiplier {:.2}x",
            multiplier
        ));
        return OperationStats {
            events_affected: 0,
            summary: format!("ignored multiplier {:.2}x", multiplier),
            styles_missing: Vec::new(),
        };
    }

    let mut changed = 0usize;
    for style in &mut data.styles {
        if let Some(size) = style.font_size() {
            style.set("fontsize", format_number(size * multiplier));
            changed += 1;
        }
    }
    let stats = OperationStats {
        events_affected: changed,
        summary: format!("scaled {} style font size(s) by {:.2}x", changed, multiplier),
        styles_missing: Vec::new(),
    };
    logger.message(&format!("[SubtitleData] Size multiplier: {}", stats.summary));
    stats
}

/// Trim trailing zeros so integer-valued results stay integers.
fn format_number(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};
    use crate::subtitles::parsers::parse_ass;

    fn logger() -> JobLogger {
        JobLogger::sink_only("style", LogConfig::default(), None)
    }

    fn sample() -> SubtitleData {
        parse_ass(
            "[Script Info]\nPlayResX: 1280\nPlayResY: 720\n\n\
             [V4+ Styles]\n\
             Format: Name, Fontname, Fontsize, MarginL, MarginR, MarginV\n\
             Style: Main,Open Sans,48,10,10,20\n\
             Style: Sign,Impact,40,0,0,0\n\
             Style: Karaoke,Comic,36,5,5,5\n\n\
             [Events]\n\
             Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
             Dialogue: 0,0:00:01.00,0:00:02.00,Main,,0,0,0,,dialogue\n\
             Dialogue: 0,0:00:03.00,0:00:04.00,Sign,,0,0,0,,sign\n\
             Dialogue: 0,0:00:05.00,0:00:06.00,Karaoke,,0,0,0,,kara\n",
        )
        .unwrap()
    }

    #[test]
    fn exclude_filter_with_forced_include() {
        let mut data = sample();
        let config = StyleFilterConfig {
            mode: StyleFilterMode::Exclude,
            styles: vec!["Sign".to_string(), "Karaoke".to_string(), "Main".to_string()],
            forced_include: vec!["Main".to_string()],
            forced_exclude: vec![],
        };
        let stats = filter_by_styles(&mut data, &config, &logger());
        assert_eq!(data.events.len(), 1);
        assert_eq!(data.events[0].style, "Main");
        assert_eq!(stats.events_affected, 2);
    }

    #[test]
    fn include_filter_keeps_only_listed() {
        let mut data = sample();
        let config = StyleFilterConfig {
            mode: StyleFilterMode::Include,
            styles: vec!["Sign".to_string()],
            forced_include: vec![],
            forced_exclude: vec![],
        };
        filter_by_styles(&mut data, &config, &logger());
        assert_eq!(data.events.len(), 1);
        assert_eq!(data.events[0].style, "Sign");
    }

    #[test]
    fn forced_exclude_beats_include_mode() {
        let mut data = sample();
        let config = StyleFilterConfig {
            mode: StyleFilterMode::Include,
            styles: vec!["Main".to_string(), "Sign".to_string()],
            forced_include: vec![],
            forced_exclude: vec!["Sign".to_string()],
        };
        filter_by_styles(&mut data, &config, &logger());
        assert_eq!(data.events.len(), 1);
        assert_eq!(data.events[0].style, "Main");
    }

    #[test]
    fn unknown_declared_styles_warn_but_do_not_fail() {
        let mut data = sample();
        let config = StyleFilterConfig {
            mode: StyleFilterMode::Exclude,
            styles: vec!["Ghost".to_string()],
            forced_include: vec![],
            forced_exclude: vec![],
        };
        let stats = filter_by_styles(&mut data, &config, &logger());
        assert_eq!(stats.styles_missing, vec!["Ghost".to_string()]);
        assert_eq!(data.events.len(), 3);
    }

    #[test]
    fn font_replacement_touches_matching_styles() {
        let mut data = sample();
        let mut map = BTreeMap::new();
        map.insert("Impact".to_string(), "Noto Sans".to_string());
        let stats = apply_font_replacements(&mut data, &map, &logger());
        assert_eq!(stats.events_affected, 1);
        assert_eq!(data.style("Sign").unwrap().font_name(), "Noto Sans");
        assert_eq!(data.style("Main").unwrap().font_name(), "Open Sans");
    }

    #[test]
    fn style_patch_overrides_fields() {
        let mut data = sample();
        let mut patch = BTreeMap::new();
        let mut overrides = BTreeMap::new();
        overrides.insert("fontsize".to_string(), "60".to_string());
        patch.insert("Main".to_string(), overrides);
        apply_style_patch(&mut data, &patch, &logger());
        assert_eq!(data.style("Main").unwrap().font_size(), Some(60.0));
    }

    #[test]
    fn rescale_scales_geometry_and_playres() {
        let mut data = sample();
        apply_rescale(&mut data, (1920, 1080), &logger());
        assert_eq!(data.play_res(), (Some(1920), Some(1080)));
        // 48 * (1080/720) = 72
        assert_eq!(data.style("Main").unwrap().font_size(), Some(72.0));
        // MarginL scales by width: 10 * 1.5 = 15
        assert_eq!(data.style("Main").unwrap().get("marginl"), Some("15"));
    }

    #[test]
    fn size_multiplier_applies_in_range_only() {
        let mut data = sample();
        apply_size_multiplier(&mut data, 1.25, &logger());
        assert_eq!(data.style("Main").unwrap().font_size(), Some(60.0));

        let before = data.style("Main").unwrap().font_size();
        apply_size_multiplier(&mut data, 10.0, &logger());
        assert_eq!(data.style("Main").unwrap().font_size(), before);
    }
}
