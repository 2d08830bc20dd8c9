//! Builders for the `on_*` callback bodies.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::applications::{ApplicationRecord, ApplicationStatus};
use crate::config::NetworkConfig;
use crate::dispatch::Callback;
use crate::eligibility::EligibilityReport;
use crate::network::{
    ActionKind, Catalog, CatalogMessage, CodedName, Context, Customer, Descriptor, Fulfillment,
    FulfillmentState, Item, ItemQuantity, Order, OrderMessage, Provider, ProviderLocation,
    QuantityCount, Request, Tag, TagEntry, Time, TimeRange,
};
use crate::offerings::Offering;
use crate::outbox::ProcessingError;

pub(crate) const CALLBACK_TTL: &str = "PT30S";
pub(crate) const APPLICATION_FULFILLMENT: &str = "F1";
pub(crate) const CANCELLATION_FULFILLMENT: &str = "C1";
pub(crate) const FULFILLMENT_TYPE: &str = "lead & recruitment";
pub(crate) const IN_PROGRESS: &str = "APPLICATION_IN_PROGRESS";
pub(crate) const NOT_ELIGIBLE: &str = "NOT_ELIGIBLE";
const STATUS_WINDOW_DAYS: i64 = 30;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Callback context: request correlation ids echoed, provider identity from config.
pub(crate) fn callback_context(
    request: &Context,
    kind: ActionKind,
    network: &NetworkConfig,
    now: DateTime<Utc>,
) -> Context {
    let or_default = |value: &str, fallback: &str| {
        if value.is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };

    Context {
        domain: or_default(&request.domain, &network.domain),
        action: kind.callback().to_string(),
        version: or_default(&request.version, &network.version),
        transaction_id: request.transaction_id.clone(),
        message_id: request.message_id.clone(),
        bap_id: request.bap_id.clone(),
        bap_uri: request.bap_uri.clone(),
        bpp_id: network.bpp_id.clone(),
        bpp_uri: network.bpp_uri.clone(),
        location: request.location.clone(),
        timestamp: timestamp(now),
        ttl: CALLBACK_TTL.to_string(),
    }
}

pub(crate) fn callback<M: Serialize>(
    request: &Context,
    kind: ActionKind,
    network: &NetworkConfig,
    now: DateTime<Utc>,
    message: &M,
) -> Result<Callback, ProcessingError> {
    let message: Value = serde_json::to_value(message)
        .map_err(|err| ProcessingError::Rejected(format!("callback encoding failed: {err}")))?;
    Ok(Callback {
        url: Callback::target(&request.bap_uri, kind),
        action: kind,
        body: Request {
            context: callback_context(request, kind, network, now),
            message,
        },
    })
}

fn provider_block(offering: &Offering) -> Provider {
    Provider {
        id: Some(offering.provider.id.clone()),
        descriptor: Some(Descriptor {
            name: Some(offering.provider.name.clone()),
            ..Descriptor::default()
        }),
        ..Provider::default()
    }
}

fn location_id(offering: &Offering) -> Option<String> {
    (!offering.location.city.is_empty()).then(|| format!("L-{}", offering.location.city))
}

fn application_fulfillment(code: &str, updated_at: Option<String>) -> Fulfillment {
    Fulfillment {
        id: Some(APPLICATION_FULFILLMENT.to_string()),
        kind: Some(FULFILLMENT_TYPE.to_string()),
        state: Some(FulfillmentState {
            descriptor: Descriptor::code(code),
            updated_at,
        }),
        ..Fulfillment::default()
    }
}

fn catalog_item(offering: &Offering) -> Item {
    let mut details = vec![TagEntry::new(
        "OFFERING_KIND",
        match offering.kind {
            crate::offerings::OfferingKind::Job => "job",
            crate::offerings::OfferingKind::Scheme => "scheme",
        },
    )];
    if let Some(industry) = &offering.provider.industry {
        details.push(TagEntry::new("INDUSTRY_TYPE", industry.clone()));
    }
    if let Some(job_type) = &offering.job_type {
        details.push(TagEntry::new("JOB_TYPE", job_type.clone()));
    }

    let mut tags = vec![Tag::group("JOB_DETAILS", details)];
    if let Some(salary) = offering.salary {
        tags.push(Tag::group(
            "SALARY_INFO",
            vec![
                TagEntry::new("MIN_SALARY", salary.min.to_string()),
                TagEntry::new("MAX_SALARY", salary.max.to_string()),
            ],
        ));
    }
    if !offering.eligibility.is_empty() {
        tags.push(Tag::group(
            "ELIGIBILITY",
            offering
                .eligibility
                .iter()
                .map(|(attribute, expected)| {
                    TagEntry::new(attribute.to_ascii_uppercase(), expected.to_string())
                })
                .collect(),
        ));
    }

    Item {
        id: offering.id.clone(),
        descriptor: Some(Descriptor {
            name: Some(offering.name.clone()),
            long_desc: (!offering.description.is_empty()).then(|| offering.description.clone()),
            ..Descriptor::default()
        }),
        location_ids: location_id(offering).into_iter().collect(),
        fulfillment_ids: vec![APPLICATION_FULFILLMENT.to_string()],
        quantity: Some(ItemQuantity {
            available: QuantityCount {
                count: offering.vacancies,
            },
        }),
        time: None,
        tags,
    }
}

/// Catalog grouped by provider, in offering id order within each provider.
pub(crate) fn catalog(offerings: &[Offering], network: &NetworkConfig) -> CatalogMessage {
    let mut providers: BTreeMap<String, Provider> = BTreeMap::new();
    for offering in offerings {
        let provider = providers
            .entry(offering.provider.id.clone())
            .or_insert_with(|| Provider {
                fulfillments: vec![Fulfillment {
                    id: Some(APPLICATION_FULFILLMENT.to_string()),
                    kind: Some(FULFILLMENT_TYPE.to_string()),
                    ..Fulfillment::default()
                }],
                ..provider_block(offering)
            });

        if let Some(id) = location_id(offering) {
            if !provider.locations.iter().any(|loc| loc.id.as_deref() == Some(id.as_str())) {
                provider.locations.push(ProviderLocation {
                    id: Some(id),
                    city: Some(CodedName {
                        code: Some(offering.location.city.clone()),
                        name: None,
                    }),
                    state: (!offering.location.state.is_empty()).then(|| CodedName {
                        code: Some(offering.location.state.clone()),
                        name: None,
                    }),
                });
            }
        }
        provider.items.push(catalog_item(offering));
    }

    CatalogMessage {
        catalog: Catalog {
            descriptor: Descriptor {
                name: Some(network.bpp_id.clone()),
                ..Descriptor::default()
            },
            providers: providers.into_values().collect(),
        },
    }
}

pub(crate) fn quote(offering: &Offering, available: u32) -> OrderMessage {
    let mut item = catalog_item(offering);
    item.quantity = Some(ItemQuantity {
        available: QuantityCount { count: available },
    });

    OrderMessage {
        order: Order {
            provider: Some(provider_block(offering)),
            items: vec![item],
            fulfillments: vec![Fulfillment {
                id: Some(APPLICATION_FULFILLMENT.to_string()),
                kind: Some(FULFILLMENT_TYPE.to_string()),
                ..Fulfillment::default()
            }],
            ..Order::default()
        },
    }
}

fn order_item(offering_id: &str, fulfillment_ids: &[&str]) -> Item {
    Item {
        id: offering_id.to_string(),
        fulfillment_ids: fulfillment_ids.iter().map(|id| id.to_string()).collect(),
        ..Item::default()
    }
}

/// `on_init`: in progress when staged, `NOT_ELIGIBLE` with per-criterion reasons otherwise.
pub(crate) fn init_result(
    offering: &Offering,
    customer: Option<&Customer>,
    report: &EligibilityReport,
) -> OrderMessage {
    let mut fulfillment = application_fulfillment(
        if report.eligible { IN_PROGRESS } else { NOT_ELIGIBLE },
        None,
    );
    fulfillment.customer = customer.cloned();
    if !report.eligible {
        fulfillment.tags = vec![Tag::group(
            "ELIGIBILITY",
            report
                .failures()
                .map(|(attribute, detail)| TagEntry::new(attribute.clone(), detail.reason.label()))
                .collect(),
        )];
    }

    OrderMessage {
        order: Order {
            provider: Some(provider_block(offering)),
            items: vec![order_item(&offering.id, &[APPLICATION_FULFILLMENT])],
            fulfillments: vec![fulfillment],
            ..Order::default()
        },
    }
}

pub(crate) fn application_order(
    record: &ApplicationRecord,
    provider: Option<Provider>,
) -> OrderMessage {
    let updated_at = timestamp(record.updated_at);
    let window_end = record.created_at + Duration::days(STATUS_WINDOW_DAYS);
    let mut item = order_item(&record.offering_id, &[APPLICATION_FULFILLMENT]);
    item.time = Some(Time {
        range: TimeRange {
            start: timestamp(record.created_at),
            end: timestamp(window_end),
        },
    });

    OrderMessage {
        order: Order {
            id: Some(record.id.to_string()),
            status: Some(record.status.code().to_string()),
            provider,
            items: vec![item],
            fulfillments: vec![application_fulfillment(
                record.status.code(),
                Some(updated_at.clone()),
            )],
            created_at: Some(timestamp(record.created_at)),
            updated_at: Some(updated_at),
        },
    }
}

pub(crate) fn cancellation(record: &ApplicationRecord) -> OrderMessage {
    let updated_at = timestamp(record.updated_at);
    OrderMessage {
        order: Order {
            id: Some(record.id.to_string()),
            status: Some(ApplicationStatus::Cancelled.code().to_string()),
            items: vec![order_item(
                &record.offering_id,
                &[APPLICATION_FULFILLMENT, CANCELLATION_FULFILLMENT],
            )],
            fulfillments: vec![
                application_fulfillment(
                    ApplicationStatus::Cancelled.code(),
                    Some(updated_at.clone()),
                ),
                Fulfillment {
                    id: Some(CANCELLATION_FULFILLMENT.to_string()),
                    kind: Some("cancellation".to_string()),
                    ..Fulfillment::default()
                },
            ],
            created_at: Some(timestamp(record.created_at)),
            updated_at: Some(updated_at),
            ..Order::default()
        },
    }
}

pub(crate) fn provider_of(offering: Option<&Offering>) -> Option<Provider> {
    offering.map(provider_block)
}
