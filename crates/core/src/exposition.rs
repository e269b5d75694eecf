//! Text exposition parser for the metrics subset vLLM emits.
//!
//! Handles `# HELP` / `# TYPE` directives, gauge and counter samples, and
//! bucketed histograms. Samples are grouped into families keyed by their
//! base name (the sample name with a known counter/histogram suffix
//! stripped). Malformed lines are skipped; parsing never fails.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Suffixes stripped to derive a family name, checked in this order.
pub const FAMILY_SUFFIXES: &[&str] = &["_total", "_bucket", "_sum", "_count", "_created"];

const HELP_PREFIX: &str = "# HELP ";
const TYPE_PREFIX: &str = "# TYPE ";

/// Matches `key="value"` pairs inside a label block.
const LABEL_PATTERN: &str = r#"(\w+)="([^"]*)""#;

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LABEL_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Declared type of a metric family, from its `# TYPE` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Gauge,
    Counter,
    Histogram,
    Summary,
    #[default]
    Untyped,
}

impl MetricType {
    /// Map a `# TYPE` directive value to a type tag. Unknown values are untyped.
    pub fn from_directive(value: &str) -> Self {
        match value.trim() {
            "gauge" => Self::Gauge,
            "counter" => Self::Counter,
            "histogram" => Self::Histogram,
            "summary" => Self::Summary,
            _ => Self::Untyped,
        }
    }
}

/// One sample line: exposition name, labels, value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// Name as it appeared on the line, suffix included.
    pub name: String,
    pub labels: HashMap<String, String>,
    pub value: f64,
}

/// All samples sharing a base name, in order of appearance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFamily {
    pub name: String,
    pub metric_type: MetricType,
    pub help: String,
    pub samples: Vec<MetricSample>,
}

/// Parsed exposition keyed by family base name.
pub type MetricFamilies = HashMap<String, MetricFamily>;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse exposition text into families keyed by base name.
///
/// Type and help text are taken from directives seen *before* the family's
/// first sample. Unparseable lines are skipped individually.
pub fn parse(text: &str) -> MetricFamilies {
    let mut families = MetricFamilies::new();
    let mut declared_types: HashMap<&str, MetricType> = HashMap::new();
    let mut declared_help: HashMap<&str, &str> = HashMap::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(HELP_PREFIX) {
            if let Some((name, help)) = rest.split_once(' ') {
                declared_help.insert(name, help);
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(TYPE_PREFIX) {
            if let Some((name, kind)) = rest.split_once(' ') {
                declared_types.insert(name, MetricType::from_directive(kind));
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let Some(sample) = parse_sample_line(line) else {
            tracing::trace!(line, "Skipping unparseable exposition line");
            continue;
        };

        let base = family_name(&sample.name);
        families
            .entry(base.to_string())
            .or_insert_with(|| MetricFamily {
                name: base.to_string(),
                metric_type: declared_types.get(base).copied().unwrap_or_default(),
                help: declared_help.get(base).map(|h| h.to_string()).unwrap_or_default(),
                samples: Vec::new(),
            })
            .samples
            .push(sample);
    }

    families
}

/// Parse a single data line of the form `name{labels} value` or `name value`.
fn parse_sample_line(line: &str) -> Option<MetricSample> {
    let (name, labels, value_str) = match line.find('{') {
        Some(brace_start) => {
            let brace_end = brace_start + line[brace_start..].find('}')?;
            let value_str = line[brace_end + 1..].split_whitespace().next()?;
            let labels = parse_labels(&line[brace_start + 1..brace_end]);
            (&line[..brace_start], labels, value_str)
        }
        None => {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let value_str = parts.next()?;
            (name, HashMap::new(), value_str)
        }
    };

    let value = value_str.parse::<f64>().ok()?;

    Some(MetricSample {
        name: name.to_string(),
        labels,
        value,
    })
}

/// Extract `key="value"` pairs from the inside of a label block.
///
/// Content that does not match yields an empty map rather than an error.
pub fn parse_labels(label_str: &str) -> HashMap<String, String> {
    LABEL_RE
        .captures_iter(label_str)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect()
}

/// Strip the first matching suffix from [`FAMILY_SUFFIXES`], if any.
pub fn family_name(sample_name: &str) -> &str {
    FAMILY_SUFFIXES
        .iter()
        .find_map(|suffix| sample_name.strip_suffix(suffix))
        .unwrap_or(sample_name)
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// First sample value of a gauge family.
pub fn gauge_value(families: &MetricFamilies, name: &str) -> Option<f64> {
    families
        .get(name)
        .and_then(|family| family.samples.first())
        .map(|sample| sample.value)
}

/// Value of a counter family: the first `_total` sample, or a sample
/// exposed under the bare base name.
pub fn counter_value(families: &MetricFamilies, name: &str) -> Option<f64> {
    families.get(name).and_then(|family| {
        family
            .samples
            .iter()
            .find(|s| s.name.ends_with("_total") || s.name == name)
            .map(|s| s.value)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# HELP vllm:num_requests_running Number of requests currently running on GPU
# TYPE vllm:num_requests_running gauge
vllm:num_requests_running 12

# HELP vllm:prompt_tokens_total Number of prefill tokens processed.
# TYPE vllm:prompt_tokens counter
vllm:prompt_tokens_total 148329

# TYPE vllm:time_to_first_token_seconds histogram
vllm:time_to_first_token_seconds_bucket{le=\"0.01\"} 5
vllm:time_to_first_token_seconds_bucket{le=\"+Inf\"} 9
vllm:time_to_first_token_seconds_count 9
vllm:time_to_first_token_seconds_sum 0.42
";

    #[test]
    fn parses_gauge_with_directives() {
        let families = parse(SAMPLE);
        let family = &families["vllm:num_requests_running"];
        assert_eq!(family.metric_type, MetricType::Gauge);
        assert_eq!(family.help, "Number of requests currently running on GPU");
        assert_eq!(gauge_value(&families, "vllm:num_requests_running"), Some(12.0));
    }

    #[test]
    fn counter_suffix_is_stripped() {
        let families = parse(SAMPLE);
        let family = &families["vllm:prompt_tokens"];
        assert_eq!(family.metric_type, MetricType::Counter);
        // HELP was declared for the suffixed name, not the base name.
        assert_eq!(family.help, "");
        assert_eq!(counter_value(&families, "vllm:prompt_tokens"), Some(148329.0));
    }

    #[test]
    fn histogram_samples_keep_arrival_order() {
        let families = parse(SAMPLE);
        let family = &families["vllm:time_to_first_token_seconds"];
        assert_eq!(family.metric_type, MetricType::Histogram);
        let names: Vec<&str> = family.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "vllm:time_to_first_token_seconds_bucket",
                "vllm:time_to_first_token_seconds_bucket",
                "vllm:time_to_first_token_seconds_count",
                "vllm:time_to_first_token_seconds_sum",
            ]
        );
        assert_eq!(family.samples[1].labels["le"], "+Inf");
    }

    #[test]
    fn family_without_directives_is_untyped() {
        let families = parse("orphan_metric 3.5");
        let family = &families["orphan_metric"];
        assert_eq!(family.metric_type, MetricType::Untyped);
        assert!(family.help.is_empty());
    }

    #[test]
    fn parse_labels_extracts_pairs() {
        let labels = parse_labels(r#"model_name="llama",le="0.5""#);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["model_name"], "llama");
        assert_eq!(labels["le"], "0.5");
    }

    #[test]
    fn malformed_label_block_yields_empty_labels() {
        assert!(parse_labels("").is_empty());
        let families = parse("broken{not labels at all} 7");
        let family = &families["broken"];
        assert!(family.samples[0].labels.is_empty());
        assert_eq!(family.samples[0].value, 7.0);
    }

    #[test]
    fn skips_unparseable_lines_and_continues() {
        let text = "\
lonely_token
bad_value abc
unclosed{le=\"1\" 4
no_value{le=\"1\"}
good_metric 1
";
        let families = parse(text);
        assert_eq!(families.len(), 1);
        assert_eq!(gauge_value(&families, "good_metric"), Some(1.0));
    }

    #[test]
    fn handles_comments_and_blank_lines() {
        let text = "
    # This is a comment
    # HELP my_gauge A test gauge
    # TYPE my_gauge gauge
    my_gauge 42.5

    ";
        let families = parse(text);
        assert_eq!(gauge_value(&families, "my_gauge"), Some(42.5));
        assert_eq!(families["my_gauge"].help, "A test gauge");
    }

    #[test]
    fn empty_input_yields_no_families() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n   \n").is_empty());
    }

    #[test]
    fn trailing_timestamp_is_ignored() {
        let families = parse("with_ts 5 1700000000000\nwith_ts_labels{a=\"b\"} 6 1700000000000");
        assert_eq!(gauge_value(&families, "with_ts"), Some(5.0));
        assert_eq!(gauge_value(&families, "with_ts_labels"), Some(6.0));
    }

    #[test]
    fn suffix_priority_strips_first_match_only() {
        assert_eq!(family_name("requests_count_total"), "requests_count");
        assert_eq!(family_name("latency_bucket"), "latency");
        assert_eq!(family_name("latency_sum"), "latency");
        assert_eq!(family_name("events_created"), "events");
        assert_eq!(family_name("plain_gauge"), "plain_gauge");
    }

    #[test]
    fn parse_is_idempotent() {
        assert_eq!(parse(SAMPLE), parse(SAMPLE));
    }

    #[test]
    fn missing_families_return_none() {
        let families = parse(SAMPLE);
        assert_eq!(gauge_value(&families, "nonexistent_metric"), None);
        assert_eq!(counter_value(&families, "nonexistent_metric"), None);
    }

    #[test]
    fn counter_ignores_created_sample() {
        let families = parse("jobs_created 1700000000\njobs_total 42");
        assert_eq!(families["jobs"].samples.len(), 2);
        assert_eq!(counter_value(&families, "jobs"), Some(42.0));
    }

    #[test]
    fn type_directive_for_unknown_kind_is_untyped() {
        assert_eq!(MetricType::from_directive("gaugehistogram"), MetricType::Untyped);
        assert_eq!(MetricType::from_directive("summary"), MetricType::Summary);
    }
}
