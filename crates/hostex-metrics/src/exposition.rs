use std::collections::HashMap;

use crate::types::{MetricDescriptor, Sample};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders samples in the Prometheus text format. Families appear in the
/// order their first sample appears; samples keep their relative order.
pub fn render_prometheus(samples: &[Sample]) -> String {
    let mut families: Vec<(&MetricDescriptor, Vec<&Sample>)> = Vec::new();
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();

    for sample in samples {
        let name = sample.descriptor.name.as_str();
        match index_by_name.get(name) {
            Some(&index) => families[index].1.push(sample),
            None => {
                index_by_name.insert(name, families.len());
                families.push((sample.descriptor.as_ref(), vec![sample]));
            }
        }
    }

    let mut output = String::new();
    for (descriptor, samples) in families {
        output.push_str("# HELP ");
        output.push_str(&descriptor.name);
        output.push(' ');
        output.push_str(&escape_help(&descriptor.help));
        output.push('\n');

        output.push_str("# TYPE ");
        output.push_str(&descriptor.name);
        output.push(' ');
        output.push_str(descriptor.kind.as_prometheus_type());
        output.push('\n');

        for sample in samples {
            output.push_str(&render_sample_line(
                &descriptor.name,
                &descriptor.label_names,
                &sample.label_values,
                sample.value,
            ));
        }
    }

    output
}

fn render_sample_line(
    name: &str,
    label_names: &[String],
    label_values: &[String],
    value: f64,
) -> String {
    let mut rendered = String::new();
    rendered.push_str(name);

    if !label_names.is_empty() {
        rendered.push('{');
        for (index, (key, value)) in label_names.iter().zip(label_values).enumerate() {
            if index > 0 {
                rendered.push(',');
            }
            rendered.push_str(key);
            rendered.push_str("=\"");
            rendered.push_str(&escape_label_value(value));
            rendered.push('"');
        }
        rendered.push('}');
    }

    rendered.push(' ');
    rendered.push_str(&format_metric_value(value));
    rendered.push('\n');
    rendered
}

fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
