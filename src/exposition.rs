// =============================================================================
// Prometheus text exposition (format 0.0.4)
// =============================================================================
//
//   # HELP <name> <help>
//   # TYPE <name> <kind>
//   <name>{k="v",...} <value>
//
// Label values escape `\`, `"` and newlines; HELP text escapes `\` and
// newlines.  Non-finite values are written as NaN, +Inf, -Inf.
// =============================================================================

use std::fmt::Write;

use crate::types::{MetricFamily, Sample};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render families in order into one exposition body.
pub fn render<'a>(families: impl IntoIterator<Item = &'a MetricFamily>) -> String {
    let mut out = String::new();
    for family in families {
        render_family(&mut out, family);
    }
    out
}

fn render_family(out: &mut String, family: &MetricFamily) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# HELP {} {}", family.name, escape_help(family.help));
    let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind);
    for sample in &family.samples {
        render_sample(out, sample);
    }
}

fn render_sample(out: &mut String, sample: &Sample) {
    out.push_str(sample.name);
    if !sample.labels.is_empty() {
        out.push('{');
        for (i, (key, value)) in sample.labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{key}=\"{}\"", escape_label_value(value));
        }
        out.push('}');
    }
    out.push(' ');
    out.push_str(&format_value(sample.value));
    out.push('\n');
}

pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

fn escape_label_value(v: &str) -> String {
    let mut s = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '\\' => s.push_str("\\\\"),
            '"' => s.push_str("\\\""),
            '\n' => s.push_str("\\n"),
            c => s.push(c),
        }
    }
    s
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricKind;

    #[test]
    fn renders_header_and_labeled_samples() {
        let mut fam = MetricFamily::new("bittrexheikinashi", "Heikin-Ashi values.", MetricKind::Gauge);
        fam.push(
            94.25,
            vec![
                ("MarketName", "BTC-USD".to_string()),
                ("Range", "6h".to_string()),
                ("Type", "xClose".to_string()),
            ],
        );
        let body = render([&fam]);
        assert_eq!(
            body,
            "# HELP bittrexheikinashi Heikin-Ashi values.\n\
             # TYPE bittrexheikinashi gauge\n\
             bittrexheikinashi{MarketName=\"BTC-USD\",Range=\"6h\",Type=\"xClose\"} 94.25\n"
        );
    }

    #[test]
    fn empty_family_still_has_metadata() {
        let fam = MetricFamily::new("lat", "Latency.", MetricKind::Summary);
        assert_eq!(render([&fam]), "# HELP lat Latency.\n# TYPE lat summary\n");
    }

    #[test]
    fn escapes_label_values() {
        let mut fam = MetricFamily::new("m", "h", MetricKind::Gauge);
        fam.push(1.0, vec![("query", "a\"b\\c\nd".to_string())]);
        let body = render([&fam]);
        assert!(body.contains(r#"m{query="a\"b\\c\nd"} 1"#));
    }

    #[test]
    fn special_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(90.0), "90");
    }

    #[test]
    fn unlabeled_sample() {
        let mut fam = MetricFamily::new("up", "h", MetricKind::Gauge);
        fam.push(1.0, Vec::new());
        assert!(render([&fam]).ends_with("up 1\n"));
    }
}
