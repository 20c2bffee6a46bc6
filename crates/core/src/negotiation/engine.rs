use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::bill::PaymentMethod;
use crate::negotiation::states::{
    DebtSnapshot, InstallmentPlan, NegotiationConfig, NegotiationEvent, NegotiationFlow,
    NegotiationState, SessionReply, SessionStep, TransitionOutcome,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("installment count {requested} is outside 1..={max_installments}")]
    OutOfRange { requested: u32, max_installments: u32 },
    #[error("event does not apply at step {step:?}")]
    UnexpectedEvent { step: SessionStep },
}

/// Issuance fee added to every installment settled by boleto slip.
fn boleto_issuance_fee() -> Decimal {
    Decimal::new(300, 2)
}

/// `total / count`, plus the boleto fee where applicable. Kept at full
/// precision; presentation rounds to 2 decimal places.
pub fn installment_amount(total_due: Decimal, count: u32, method: PaymentMethod) -> Decimal {
    let base = total_due / Decimal::from(count.max(1));
    match method {
        PaymentMethod::Boleto => base + boleto_issuance_fee(),
        PaymentMethod::Pix | PaymentMethod::Card => base,
    }
}

/// Pure transition function. Returns the complete successor state, so the
/// caller commits all-or-nothing; on `Err` the current state stands.
pub fn transition(
    state: &NegotiationState,
    event: &NegotiationEvent,
    config: &NegotiationConfig,
) -> Result<TransitionOutcome, NegotiationError> {
    use NegotiationEvent::{
        DebtReviewed, InstallmentsRequested, PaymentMethodSelected, ResetRequested,
    };
    use SessionStep::{
        AwaitingIdentifier, AwaitingInstallmentChoice, AwaitingPaymentMethod, Completed, Reviewing,
    };

    let from = state.step;
    let (next, reply) = match (state.step, event) {
        (_, ResetRequested) => (NegotiationState::default(), SessionReply::SessionCleared),

        (AwaitingIdentifier, DebtReviewed { national_id, statement }) => {
            let snapshot =
                DebtSnapshot { national_id: national_id.clone(), statement: statement.clone() };

            if !statement.has_overdue() {
                let next = NegotiationState {
                    step: Completed,
                    debt: Some(snapshot),
                    chosen_installments: None,
                    payment_method: None,
                };
                (next, SessionReply::SettledUp { statement: statement.clone() })
            } else {
                let step = match config.flow {
                    NegotiationFlow::MultiStep => AwaitingInstallmentChoice,
                    NegotiationFlow::SingleCommand => Reviewing,
                };
                let next = NegotiationState {
                    step,
                    debt: Some(snapshot),
                    chosen_installments: None,
                    payment_method: None,
                };
                (next, SessionReply::Statement { statement: statement.clone() })
            }
        }

        (Reviewing | AwaitingInstallmentChoice, InstallmentsRequested { count }) => {
            let Some(debt) = &state.debt else {
                return Err(NegotiationError::UnexpectedEvent { step: state.step });
            };

            let max_installments = debt.statement.max_installments;
            if *count < 1 || *count > max_installments {
                return Err(NegotiationError::OutOfRange { requested: *count, max_installments });
            }

            match config.flow {
                // The single-command deployment always settles by boleto
                // slip and ends the dialogue in one hop.
                NegotiationFlow::SingleCommand => {
                    let plan = InstallmentPlan {
                        total_due: debt.statement.total_due,
                        installments: *count,
                        payment_method: PaymentMethod::Boleto,
                        per_installment: installment_amount(
                            debt.statement.total_due,
                            *count,
                            PaymentMethod::Boleto,
                        ),
                    };
                    let next = NegotiationState {
                        step: Completed,
                        debt: state.debt.clone(),
                        chosen_installments: Some(*count),
                        payment_method: Some(PaymentMethod::Boleto),
                    };
                    (next, SessionReply::InstallmentPlan(plan))
                }
                NegotiationFlow::MultiStep => {
                    let next = NegotiationState {
                        step: AwaitingPaymentMethod,
                        debt: state.debt.clone(),
                        chosen_installments: Some(*count),
                        payment_method: None,
                    };
                    let reply = SessionReply::InstallmentsAccepted {
                        installments: *count,
                        total_due: debt.statement.total_due,
                    };
                    (next, reply)
                }
            }
        }

        (AwaitingPaymentMethod, PaymentMethodSelected { method }) => {
            let (Some(debt), Some(installments)) = (&state.debt, state.chosen_installments) else {
                return Err(NegotiationError::UnexpectedEvent { step: state.step });
            };

            let plan = InstallmentPlan {
                total_due: debt.statement.total_due,
                installments,
                payment_method: *method,
                per_installment: installment_amount(
                    debt.statement.total_due,
                    installments,
                    *method,
                ),
            };
            let next = NegotiationState {
                step: Completed,
                debt: state.debt.clone(),
                chosen_installments: Some(installments),
                payment_method: Some(*method),
            };
            (next, SessionReply::InstallmentPlan(plan))
        }

        _ => return Err(NegotiationError::UnexpectedEvent { step: state.step }),
    };

    Ok(TransitionOutcome { from, to: next.step, state: next, reply })
}
