//! .NET CLR security counters, one series per managed process.

use hostex_common::error::Result;

use crate::{
    collector::{Collector, CollectorDeps},
    registry::RegistryBuilder,
    table::{FieldSpec, LabelSpec, Schema, TableCollector},
};

pub const NAME: &str = "netframework_clrsecurity";

pub static SCHEMA: Schema = Schema {
    class: "Win32_PerfRawData_NETFramework_NETCLRSecurity",
    subsystem: "netframework_clrsecurity",
    fields: &[
        FieldSpec::counter(
            "NumberLinkTimeChecks",
            "link_time_checks_total",
            "Total number of link-time code access security checks since application startup.",
        ),
        FieldSpec::gauge(
            "PercentTimeinRTchecks",
            "rt_checks_time_percent",
            "Raw ratio of elapsed time spent in runtime code access security checks.",
        ),
        FieldSpec::gauge(
            "StackWalkDepth",
            "stack_walk_depth",
            "Depth of the stack during the last runtime code access security check.",
        ),
        FieldSpec::counter(
            "TotalRuntimeChecks",
            "runtime_checks_total",
            "Total number of runtime code access security checks performed since startup.",
        ),
    ],
    labels: &[LabelSpec {
        field: "Name",
        label: "process",
    }],
    skip_instances: &["_Global_"],
};

pub fn register(registry: &mut RegistryBuilder) {
    registry.register(NAME, new);
}

fn new(deps: &CollectorDeps) -> Result<Box<dyn Collector>> {
    Ok(Box::new(TableCollector::new(&SCHEMA, deps)?))
}
