//! Printable SVG export of a bracket

use std::fmt::Write;

use rustc_hash::FxHashMap;

use super::layout::BracketLayout;
use super::{Bracket, Matchup};

const TITLE_BAND: f64 = 48.0;
const CHAMPION_BAND: f64 = 40.0;

/// Render `bracket` drawn with `layout`. `names` maps saint id to display name.
pub fn render_svg(bracket: &Bracket, layout: &BracketLayout, names: &FxHashMap<i64, String>) -> String {
    let width = layout.width;
    let height = layout.height + TITLE_BAND + CHAMPION_BAND;
    let mut out = String::with_capacity(16 * 1024);

    // write! into a String cannot fail
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}" font-family="Georgia, serif">"#,
        w = width,
        h = height
    );
    let _ = writeln!(
        out,
        r##"<rect x="0" y="0" width="{:.0}" height="{:.0}" fill="#fffdf7"/>"##,
        width, height
    );
    let _ = writeln!(
        out,
        r#"<text x="{:.1}" y="22" text-anchor="middle" font-size="18" font-weight="bold">{}</text>"#,
        width / 2.0,
        escape(&bracket.title)
    );

    for round in &bracket.rounds {
        let x = layout.column_x(round.index) + layout.options.box_width / 2.0;
        let _ = writeln!(
            out,
            r##"<text x="{:.1}" y="42" text-anchor="middle" font-size="12" fill="#555">{}</text>"##,
            x,
            escape(&round.name)
        );
    }

    let _ = writeln!(out, r#"<g transform="translate(0,{:.0})">"#, TITLE_BAND);

    for line in &layout.lines {
        let _ = writeln!(
            out,
            r##"<polyline points="{}" fill="none" stroke="#8a7f6a" stroke-width="1.5"/>"##,
            line.svg_points()
        );
    }

    for matchup in bracket.matchups() {
        if let Some(b) = layout.matchup_box(matchup.round, matchup.position) {
            let _ = writeln!(
                out,
                r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="4" fill="#ffffff" stroke="#3d3522"/>"##,
                b.x, b.y, b.width, b.height
            );
            let half = b.height / 2.0;
            let _ = writeln!(
                out,
                r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#d8d0bd"/>"##,
                b.x,
                b.y + half,
                b.x + b.width,
                b.y + half
            );
            for (slot, saint) in [(0.0, matchup.saint_a), (1.0, matchup.saint_b)] {
                let text_y = b.y + slot * half + half / 2.0 + 4.0;
                let _ = writeln!(
                    out,
                    r#"<text x="{:.1}" y="{:.1}" font-size="12"{}>{}</text>"#,
                    b.x + 8.0,
                    text_y,
                    if is_winner(matchup, saint) { r#" font-weight="bold""# } else { "" },
                    escape(&slot_label(saint, names, b.width))
                );
            }
        }
    }

    let _ = writeln!(out, "</g>");

    if let Some(champion) = bracket.final_matchup().and_then(|m| m.winner) {
        let name = names.get(&champion).map(String::as_str).unwrap_or("Unknown");
        let _ = writeln!(
            out,
            r##"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="16" fill="#7a5c00">Blessed Intercessor: {}</text>"##,
            width / 2.0,
            height - 14.0,
            escape(name)
        );
    }

    out.push_str("</svg>\n");
    out
}

fn is_winner(matchup: &Matchup, saint: Option<i64>) -> bool {
    saint.is_some() && matchup.winner == saint
}

/// Saint name cut to what fits the box at ~7px per character.
fn slot_label(saint: Option<i64>, names: &FxHashMap<i64, String>, box_width: f64) -> String {
    let name = match saint {
        Some(id) => names.get(&id).cloned().unwrap_or_else(|| format!("Saint #{}", id)),
        None => return "TBD".to_string(),
    };
    let max_chars = ((box_width - 16.0) / 7.0).max(4.0) as usize;
    if name.chars().count() <= max_chars {
        name
    } else {
        let cut: String = name.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", cut.trim_end())
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::layout::{compute_layout, LayoutOptions};

    fn decided_bracket() -> (Bracket, FxHashMap<i64, String>) {
        let mut bracket = Bracket::empty(2026, "Saintfest <2026>", 4, vec![]).unwrap();
        for (position, (a, b)) in [(1, 2), (3, 4)].into_iter().enumerate() {
            let m = bracket.matchup_mut(0, position).unwrap();
            m.saint_a = Some(a);
            m.saint_b = Some(b);
        }
        bracket.record_winner(0, 0, 1).unwrap();
        bracket.record_winner(0, 1, 4).unwrap();
        bracket.record_winner(1, 0, 4).unwrap();

        let names: FxHashMap<i64, String> = [
            (1, "Augustine of Hippo"),
            (2, "Monica"),
            (3, "Benedict"),
            (4, "Thérèse & the Little Way"),
        ]
        .into_iter()
        .map(|(id, n)| (id, n.to_string()))
        .collect();
        (bracket, names)
    }

    #[test]
    fn test_render_contains_structure() {
        let (bracket, names) = decided_bracket();
        let layout = compute_layout(bracket.size, &LayoutOptions::default()).unwrap();
        let svg = render_svg(&bracket, &layout, &names);

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert_eq!(svg.matches("rx=\"4\"").count(), 3);
        assert!(svg.contains("Saintfest &lt;2026&gt;"));
        assert!(svg.contains("Consecrated Quaternary"));
        assert!(svg.contains("Blessed Intercessor: Thérèse &amp; the Little Way"));
        assert!(svg.contains(r#"font-weight="bold">Augustine of Hippo"#));
    }

    #[test]
    fn test_empty_slots_are_tbd() {
        let bracket = Bracket::empty(2026, "Draft", 4, vec![]).unwrap();
        let layout = compute_layout(4, &LayoutOptions::default()).unwrap();
        let svg = render_svg(&bracket, &layout, &FxHashMap::default());
        assert_eq!(svg.matches(">TBD<").count(), 6);
        assert!(!svg.contains("Blessed Intercessor"));
    }

    #[test]
    fn test_slot_label_truncates() {
        let names: FxHashMap<i64, String> = [(1, "Maximilian Maria Kolbe of Niepokalanów".to_string())]
            .into_iter()
            .collect();
        let label = slot_label(Some(1), &names, 100.0);
        assert_eq!(label, "Maximilian…");
        assert!(label.ends_with('…'));
        assert_eq!(slot_label(Some(7), &names, 200.0), "Saint #7");
    }
}
