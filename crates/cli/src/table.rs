//! A plain bordered table renderer, grounded on the column-width-then-pad
//! approach of `common/console/table.{h,cc}` in the original source, minus
//! its terminal color support (out of scope here — §6 "prints tables").

/// Render `headers` and `rows` as a bordered text table.
pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    let separator = border_line(&widths);

    out.push_str(&separator);
    out.push_str(&row_line(headers.iter().map(|h| h.to_string()).collect::<Vec<_>>().as_slice(), &widths));
    out.push_str(&separator);
    for row in rows {
        out.push_str(&row_line(row, &widths));
    }
    out.push_str(&separator);
    out
}

fn border_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.push_str(&"-".repeat(w + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn row_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(width - cell.len()));
        line.push_str(" |");
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_columns_to_widest_cell() {
        let rendered = render(&["id", "name"], &[vec!["1".into(), "alice".into()], vec!["20".into(), "bob".into()]]);
        for line in rendered.lines() {
            assert_eq!(line.chars().count(), rendered.lines().next().unwrap().chars().count());
        }
        assert!(rendered.contains("alice"));
    }
}
