use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Turn model output into styled lines: headings, lists, quotes, rules,
/// fenced code, and inline `**bold**`, `*italic*`, `` `code` ``,
/// `~~strike~~`.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code_block = false;

    for raw in text.lines() {
        let trimmed = raw.trim_start();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            lines.push(Line::from(Span::styled(
                format!("  {}", raw.replace('\t', "    ")),
                Style::default().fg(Color::Yellow),
            )));
            continue;
        }

        lines.push(render_block_line(raw));
    }

    lines
}

fn render_block_line(raw: &str) -> Line<'static> {
    let indent_len = raw.len() - raw.trim_start().len();
    let indent = raw[..indent_len].replace('\t', "  ");
    let line = &raw[indent_len..];

    if let Some((level, heading)) = heading(line) {
        let style = match level {
            1 => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            2 => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            _ => Style::default().add_modifier(Modifier::BOLD),
        };
        return Line::from(parse_inline(heading, style));
    }

    if line == "---" || line == "***" {
        return Line::from(Span::styled(
            "─".repeat(24),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if let Some(quote) = line.strip_prefix("> ").or_else(|| line.strip_prefix('>')) {
        let style = Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::ITALIC);
        let mut spans = vec![Span::raw(indent), Span::styled("│ ", Style::default().fg(Color::DarkGray))];
        spans.extend(parse_inline(quote, style));
        return Line::from(spans);
    }

    if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        let mut spans = vec![Span::raw(indent), Span::styled("• ", Style::default().fg(Color::Magenta))];
        spans.extend(parse_inline(item, Style::default()));
        return Line::from(spans);
    }

    if let Some((number, item)) = numbered_item(line) {
        let mut spans = vec![
            Span::raw(indent),
            Span::styled(format!("{}. ", number), Style::default().fg(Color::Magenta)),
        ];
        spans.extend(parse_inline(item, Style::default()));
        return Line::from(spans);
    }

    let mut spans = vec![Span::raw(indent)];
    spans.extend(parse_inline(line, Style::default()));
    Line::from(spans)
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&level) {
        line[level..].strip_prefix(' ').map(|rest| (level, rest))
    } else {
        None
    }
}

fn numbered_item(line: &str) -> Option<(&str, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .map(|rest| (&line[..digits], rest))
}

/// Inline spans for one line. Unclosed markers are kept as literal text.
pub fn parse_inline(text: &str, base: Style) -> Vec<Span<'static>> {
    let markers = [
        ("**", base.add_modifier(Modifier::BOLD)),
        ("~~", base.add_modifier(Modifier::CROSSED_OUT)),
        ("`", Style::default().fg(Color::Yellow).bg(Color::Black)),
        ("*", base.add_modifier(Modifier::ITALIC)),
    ];

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    'outer: while !rest.is_empty() {
        for (marker, style) in markers {
            let Some(after) = rest.strip_prefix(marker) else {
                continue;
            };
            let Some(end) = after.find(marker) else {
                continue;
            };
            let inner = &after[..end];
            if inner.is_empty() || inner.starts_with(' ') || inner.ends_with(' ') {
                continue;
            }

            if !plain.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut plain), base));
            }
            spans.push(Span::styled(inner.to_string(), style));
            rest = &after[end + marker.len()..];
            continue 'outer;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            plain.push(c);
        }
        rest = chars.as_str();
    }

    if !plain.is_empty() {
        spans.push(Span::styled(plain, base));
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_bold_italic_code_and_strike() {
        let spans = parse_inline("a **b** *c* `d` ~~e~~", Style::default());
        let styled: Vec<_> = spans
            .iter()
            .filter(|s| s.style != Style::default())
            .map(|s| s.content.to_string())
            .collect();

        assert_eq!(styled, vec!["b", "c", "d", "e"]);
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert!(spans[3].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_unclosed_or_spaced_markers_stay_literal() {
        let spans = parse_inline("**open and 2 * 3 * 4", Style::default());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "**open and 2 * 3 * 4");
    }

    #[test]
    fn test_block_elements() {
        let lines = render_markdown("# Title\n- item\n\t- nested\n2. second\n> quoted\nplain");

        assert_eq!(text_of(&lines[0]), "Title");
        assert_eq!(text_of(&lines[1]), "• item");
        assert_eq!(text_of(&lines[2]), "  • nested");
        assert_eq!(text_of(&lines[3]), "2. second");
        assert_eq!(text_of(&lines[4]), "│ quoted");
        assert_eq!(text_of(&lines[5]), "plain");
    }

    #[test]
    fn test_code_fence_is_not_parsed_inline() {
        let lines = render_markdown("```rust\nlet x = **y**;\n```\nafter");

        assert_eq!(lines.len(), 2);
        assert_eq!(text_of(&lines[0]), "  let x = **y**;");
        assert_eq!(text_of(&lines[1]), "after");
    }
}
