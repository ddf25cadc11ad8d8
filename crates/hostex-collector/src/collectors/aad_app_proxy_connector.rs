//! Microsoft Entra (Azure AD) application proxy connector counters.

use hostex_common::error::Result;

use crate::{
    collector::{Collector, CollectorDeps},
    registry::RegistryBuilder,
    table::{FieldSpec, Schema, TableCollector},
};

pub const NAME: &str = "microsoft_aadappproxyconnector";

const CLASS: &str =
    "Win32_PerfFormattedData_MicrosoftAADAppProxyConnector_MicrosoftAADAppProxyConnector";

pub static SCHEMA: Schema = Schema {
    class: CLASS,
    subsystem: "microsoft_aadappproxyconnector",
    fields: &[
        FieldSpec::gauge(
            "Numbercurrentactivebackendwebsockets",
            "number_current_active_backend_websockets",
            "Displays the total number of current connected websockets.",
        ),
        FieldSpec::gauge(
            "NumbernewbackendwebsocketsPersec",
            "number_new_backend_websockets_persec",
            "New backend websockets opened per second.",
        ),
        FieldSpec::counter(
            "Numberrequests",
            "number_requests",
            "Total number of requests handled by the connector.",
        ),
        FieldSpec::gauge(
            "NumberrequestsPersec",
            "number_requests_persec",
            "Requests handled per second.",
        ),
        FieldSpec::counter(
            "Numberresponses",
            "number_responses",
            "Total number of responses returned by the connector.",
        ),
        FieldSpec::gauge(
            "NumberresponsesPersec",
            "number_responses_persec",
            "Responses returned per second.",
        ),
        FieldSpec::counter(
            "Numbertransactionscompletions",
            "number_transactions_completions",
            "Total number of completed transactions.",
        ),
        FieldSpec::gauge(
            "NumbertransactionscompletionsPersec",
            "number_transactions_completions_persec",
            "Transactions completed per second.",
        ),
        FieldSpec::counter(
            "Numbertransactionsfailed",
            "number_transactions_failed",
            "Total number of failed transactions.",
        ),
        FieldSpec::gauge(
            "NumbertransactionsfailedPersec",
            "number_transactions_failed_persec",
            "Transactions failed per second.",
        ),
    ],
    labels: &[],
    skip_instances: &[],
};

pub fn register(registry: &mut RegistryBuilder) {
    registry.register(NAME, new);
}

fn new(deps: &CollectorDeps) -> Result<Box<dyn Collector>> {
    Ok(Box::new(TableCollector::new(&SCHEMA, deps)?))
}
