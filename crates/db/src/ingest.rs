use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use cobranca_core::domain::bill::{Bill, BillId, Debtor, NationalId};

use crate::repositories::{DebtorRepository, RepositoryError};

/// One exported calendar event. The daily sync job exports events whose
/// titles follow `Boleto - <national id> - <amount>`; the event colour marks
/// settled bills and the event date is the due date.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    #[serde(default)]
    pub color_id: Option<String>,
    pub date: NaiveDate,
}

/// Colour codes the calendar uses for settled bills (cyan and yellow).
const PAID_COLOR_IDS: [&str; 2] = ["4", "7"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("feed is not valid JSON: {0}")]
    MalformedFeed(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub debtors: usize,
    pub bills: usize,
    pub skipped: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ParsedBoleto {
    national_id: NationalId,
    amount: Decimal,
    due_date: NaiveDate,
    paid: bool,
}

pub fn parse_feed(raw: &str) -> Result<Vec<CalendarEvent>, IngestError> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_boleto_event(event: &CalendarEvent) -> Result<Option<ParsedBoleto>, String> {
    let mut segments = event.summary.splitn(3, " - ");
    let prefix = segments.next().unwrap_or_default().trim();
    if prefix != "Boleto" {
        // Unrelated calendar entry, not an error.
        return Ok(None);
    }

    let national_id = segments.next().map(str::trim).unwrap_or_default();
    if national_id.is_empty() {
        return Err(format!("event `{}` has no debtor identifier", event.summary));
    }

    let raw_amount = segments.next().map(str::trim).unwrap_or_default();
    let normalized_amount = raw_amount.replace(',', ".");
    let amount = Decimal::from_str(&normalized_amount)
        .map_err(|_| format!("event `{}` has a malformed amount `{raw_amount}`", event.summary))?;
    if amount < Decimal::ZERO {
        return Err(format!("event `{}` has a negative amount", event.summary));
    }

    let paid = event
        .color_id
        .as_deref()
        .is_some_and(|color| PAID_COLOR_IDS.contains(&color));

    Ok(Some(ParsedBoleto {
        national_id: NationalId::new(national_id),
        amount,
        due_date: event.date,
        paid,
    }))
}

/// Imports one full feed export. Each debtor appearing in the feed has its
/// bill set replaced wholesale (the sync job rewrites the ledger daily);
/// debtors absent from the feed are untouched. Unparseable records are
/// skipped and reported, never fatal to the batch.
pub async fn import_feed<R>(
    repository: &R,
    events: &[CalendarEvent],
) -> Result<IngestSummary, RepositoryError>
where
    R: DebtorRepository,
{
    let mut summary = IngestSummary::default();
    let mut grouped: BTreeMap<String, Vec<ParsedBoleto>> = BTreeMap::new();

    for event in events {
        match parse_boleto_event(event) {
            Ok(Some(parsed)) => {
                grouped.entry(parsed.national_id.as_str().to_owned()).or_default().push(parsed);
            }
            Ok(None) => {}
            Err(reason) => summary.skipped.push(reason),
        }
    }

    for (national_id, mut boletos) in grouped {
        boletos.sort_by(|left, right| {
            (left.due_date, left.amount).cmp(&(right.due_date, right.amount))
        });

        let bills: Vec<Bill> = boletos
            .into_iter()
            .enumerate()
            .map(|(index, parsed)| Bill {
                id: BillId(format!("{national_id}:{}:{index}", parsed.due_date.format("%Y-%m-%d"))),
                amount: parsed.amount,
                due_date: parsed.due_date,
                paid: parsed.paid,
            })
            .collect();

        summary.bills += bills.len();
        summary.debtors += 1;
        repository.save(Debtor { national_id: NationalId::new(&national_id), bills }).await?;
    }

    Ok(summary)
}
