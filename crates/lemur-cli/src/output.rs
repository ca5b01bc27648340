use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Left-aligned columns separated by two spaces, with a dashed rule under the header.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    for line in render_table(headers, &rows) {
        println!("{line}");
    }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let join = |cells: Vec<String>| cells.join("  ").trim_end().to_string();
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(join(
        headers
            .iter()
            .zip(&widths)
            .map(|(h, &w)| format!("{h:w$}"))
            .collect(),
    ));
    lines.push(join(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        lines.push(join(
            row.iter()
                .zip(&widths)
                .map(|(cell, &w)| format!("{cell:w$}"))
                .collect(),
        ));
    }
    lines
}
