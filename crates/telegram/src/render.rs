use std::fmt::Write;

use rust_decimal::Decimal;

use cobranca_core::balance::Statement;
use cobranca_core::domain::bill::PaymentMethod;
use cobranca_core::negotiation::states::{
    InstallmentPlan, NegotiationFlow, SessionReply, SessionStep,
};
use cobranca_core::session::SessionSignal;

/// All money leaves the system rounded to two decimal places; everything
/// upstream stays at full precision.
fn money(amount: Decimal) -> String {
    format!("R$ {:.2}", amount.round_dp(2))
}

pub fn identifier_prompt() -> String {
    "Hello! Send your CPF to look up outstanding bills.".to_owned()
}

pub fn help_text(flow: NegotiationFlow) -> String {
    let negotiate_hint = match flow {
        NegotiationFlow::SingleCommand => {
            "/renegociar N - split the outstanding total into N installments"
        }
        NegotiationFlow::MultiStep => {
            "after a lookup, reply with an installment count and then a payment method"
        }
    };

    format!(
        "Commands:\n/start - restart the conversation\n/help - this message\n{negotiate_hint}"
    )
}

pub fn reply_text(reply: &SessionReply, flow: NegotiationFlow) -> String {
    match reply {
        SessionReply::Statement { statement } => statement_text(statement, flow),
        SessionReply::SettledUp { statement } => settled_text(statement),
        SessionReply::InstallmentsAccepted { installments, total_due } => format!(
            "{installments} installments of {} noted. How would you like to pay? (pix, card or boleto)",
            money(*total_due / Decimal::from(*installments))
        ),
        SessionReply::InstallmentPlan(plan) => plan_text(plan),
        SessionReply::SessionCleared => identifier_prompt(),
    }
}

pub fn signal_text(signal: &SessionSignal) -> String {
    match signal {
        SessionSignal::NotFound => {
            "CPF not found. Check the number and try again.".to_owned()
        }
        SessionSignal::LookupFailed(_) => {
            "The ledger is unreachable right now. Please try again shortly.".to_owned()
        }
        SessionSignal::OutOfRange { max_installments, .. } => {
            if *max_installments >= 1 {
                format!("Choose between 1 and {max_installments} installments.")
            } else {
                "This debt is below the installment minimum and must be settled in one payment."
                    .to_owned()
            }
        }
        SessionSignal::InvalidMethod { supplied } => {
            format!("Unknown payment method `{supplied}`. Choose one of: pix, card, boleto.")
        }
        SessionSignal::UnexpectedInput { step } => step_hint(*step),
        SessionSignal::InvalidInput(_) => {
            "The balance could not be computed. Send /start to begin again.".to_owned()
        }
    }
}

fn step_hint(step: SessionStep) -> String {
    match step {
        SessionStep::AwaitingIdentifier => "Send your CPF to look up outstanding bills.".to_owned(),
        SessionStep::Reviewing => {
            "Use /renegociar N to choose the number of installments.".to_owned()
        }
        SessionStep::AwaitingInstallmentChoice => {
            "Reply with the number of installments you would like.".to_owned()
        }
        SessionStep::AwaitingPaymentMethod => {
            "Reply with a payment method: pix, card or boleto.".to_owned()
        }
        SessionStep::Completed => {
            "This negotiation is finished. Send /start to begin a new one.".to_owned()
        }
    }
}

fn statement_text(statement: &Statement, flow: NegotiationFlow) -> String {
    let mut text = String::from("Active bills:\n");
    if statement.active.is_empty() {
        text.push_str("none\n");
    } else {
        for bill in &statement.active {
            let _ = writeln!(text, "- {}: {}, due {}", bill.id.0, money(bill.amount), bill.due_date);
        }
    }

    text.push_str("\nOverdue bills:\n");
    for entry in &statement.overdue {
        let _ = writeln!(
            text,
            "- {}: {} -> {} ({} days overdue)",
            entry.bill.id.0,
            money(entry.bill.amount),
            money(entry.corrected_amount),
            entry.days_overdue
        );
    }

    let _ = writeln!(text, "\nOverdue total (penalty and interest): {}", money(statement.overdue_total));
    if statement.aging_surcharge > Decimal::ZERO {
        let _ = writeln!(text, "Aged-bill surcharge: {}", money(statement.aging_surcharge));
    }
    let _ = writeln!(text, "Total due: {}", money(statement.total_due));

    if statement.max_installments == 0 {
        text.push_str(
            "The total is below the installment minimum; it must be settled in one payment.",
        );
    } else {
        match flow {
            NegotiationFlow::SingleCommand => {
                let _ = write!(
                    text,
                    "You can split this into up to {} installments with /renegociar N.",
                    statement.max_installments
                );
            }
            NegotiationFlow::MultiStep => {
                let _ = write!(
                    text,
                    "You can split this into up to {} installments. How many would you like?",
                    statement.max_installments
                );
            }
        }
    }

    text
}

fn settled_text(statement: &Statement) -> String {
    if statement.active.is_empty() {
        return "No outstanding bills found. You are all settled.".to_owned();
    }

    let mut text = String::from("Nothing overdue. Upcoming bills:\n");
    for bill in &statement.active {
        let _ = writeln!(text, "- {}: {}, due {}", bill.id.0, money(bill.amount), bill.due_date);
    }
    text
}

fn plan_text(plan: &InstallmentPlan) -> String {
    let method = match plan.payment_method {
        PaymentMethod::Pix => "pix",
        PaymentMethod::Card => "card",
        PaymentMethod::Boleto => "boleto (includes the R$ 3.00 slip fee)",
    };

    format!(
        "Agreed: {} installments of {} via {method}. Total due: {}.",
        plan.installments,
        money(plan.per_installment),
        money(plan.total_due)
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use cobranca_core::balance::{OverdueBill, Statement};
    use cobranca_core::domain::bill::{Bill, BillId, PaymentMethod};
    use cobranca_core::negotiation::states::{InstallmentPlan, NegotiationFlow, SessionReply};
    use cobranca_core::session::{LedgerError, SessionSignal};

    use super::{reply_text, signal_text};

    fn statement() -> Statement {
        let overdue_bill = Bill {
            id: BillId("b-1".to_owned()),
            amount: Decimal::new(500_00, 2),
            due_date: NaiveDate::from_ymd_opt(2025, 5, 6).expect("valid date"),
            paid: false,
        };
        Statement {
            active: vec![Bill {
                id: BillId("b-2".to_owned()),
                amount: Decimal::new(89_90, 2),
                due_date: NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date"),
                paid: false,
            }],
            overdue: vec![OverdueBill {
                bill: overdue_bill,
                days_overdue: 40,
                corrected_amount: Decimal::new(571_0000, 4),
            }],
            overdue_total: Decimal::new(571_0000, 4),
            aging_surcharge: Decimal::new(10_00, 2),
            total_due: Decimal::new(581_0000, 4),
            max_installments: 5,
        }
    }

    #[test]
    fn statement_rendering_includes_totals_and_the_installment_bound() {
        let text =
            reply_text(&SessionReply::Statement { statement: statement() }, NegotiationFlow::MultiStep);

        assert!(text.contains("R$ 571.00"));
        assert!(text.contains("R$ 581.00"));
        assert!(text.contains("40 days overdue"));
        assert!(text.contains("up to 5 installments"));
    }

    #[test]
    fn single_command_statement_points_at_the_command() {
        let text = reply_text(
            &SessionReply::Statement { statement: statement() },
            NegotiationFlow::SingleCommand,
        );
        assert!(text.contains("/renegociar"));
    }

    #[test]
    fn plan_rendering_rounds_the_thirds() {
        let plan = InstallmentPlan {
            total_due: Decimal::from(100),
            installments: 3,
            payment_method: PaymentMethod::Pix,
            per_installment: Decimal::from(100) / Decimal::from(3),
        };

        let text = reply_text(&SessionReply::InstallmentPlan(plan), NegotiationFlow::MultiStep);
        assert!(text.contains("R$ 33.33"), "got: {text}");
    }

    #[test]
    fn signals_render_actionable_messages() {
        assert!(signal_text(&SessionSignal::NotFound).contains("CPF not found"));
        assert!(signal_text(&SessionSignal::LookupFailed(LedgerError("boom".to_owned())))
            .contains("try again"));
        assert!(signal_text(&SessionSignal::OutOfRange { requested: 9, max_installments: 5 })
            .contains("between 1 and 5"));
        assert!(signal_text(&SessionSignal::OutOfRange { requested: 1, max_installments: 0 })
            .contains("one payment"));
        assert!(signal_text(&SessionSignal::InvalidMethod { supplied: "cash".to_owned() })
            .contains("pix, card, boleto"));
    }
}
