use clausemap_core::locate::{ClausePlacement, PlacementStatus};
use clausemap_core::model::DocumentLayout;
use std::fmt::Write;

const MAX_TEXT_WIDTH: usize = 60;

pub fn format_layout(layout: &DocumentLayout) -> String {
    let mut out = String::new();

    for page in &layout.pages {
        let _ = writeln!(
            out,
            "=== Page {} ({:.0} x {:.0}) ===\n",
            page.number, page.width, page.height
        );
        let _ = writeln!(
            out,
            "  {:>8} {:>8} {:>8} {:>8}  Text",
            "Left", "Top", "Width", "Height"
        );
        for fragment in layout.fragments_on(page.number) {
            let b = &fragment.bounding_box;
            let _ = writeln!(
                out,
                "  {:>8.1} {:>8.1} {:>8.1} {:>8.1}  {}",
                b.left,
                b.top,
                b.width,
                b.height,
                truncate(&fragment.text)
            );
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "{} fragment(s) on {} page(s)",
        layout.fragments.len(),
        layout.page_count()
    );
    out
}

pub fn format_placements(placements: &[ClausePlacement]) -> String {
    let mut out = String::new();

    for (i, p) in placements.iter().enumerate() {
        let status = match p.status {
            PlacementStatus::Located => "found",
            PlacementStatus::Fallback => "FALLBACK",
            PlacementStatus::Omitted => "OMITTED",
        };
        let position = match p.position() {
            Some((page, b)) => format!("p{page} {b}"),
            None => "-".to_string(),
        };
        let quality = p
            .quality
            .map(|q| format!("{q:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:>3}  {:<8}  {:<32}  {:>4}  {}",
            i + 1,
            status,
            position,
            quality,
            truncate(&p.query.text)
        );
    }

    let located = placements
        .iter()
        .filter(|p| p.status == PlacementStatus::Located)
        .count();
    let _ = writeln!(
        out,
        "\n{located} of {} clause(s) located",
        placements.len()
    );
    out
}

fn truncate(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_TEXT_WIDTH {
        return flat;
    }
    let cut: String = flat.chars().take(MAX_TEXT_WIDTH - 3).collect();
    format!("{cut}...")
}
