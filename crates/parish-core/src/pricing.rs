//! Registration Pricing
//!
//! Pure price calculator for event registrations. Children get a
//! promotional tier and the youngest are exempt; the note ends up
//! appended to the charge description shown to the payer.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Payment method codes accepted by the payment provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingType {
    /// Payer chooses the method on the provider's checkout page
    #[default]
    Undefined,
    Pix,
    Boleto,
    CreditCard,
}

impl BillingType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Pix => "PIX",
            Self::Boleto => "BOLETO",
            Self::CreditCard => "CREDIT_CARD",
        }
    }
}

/// A priced registration: amount, provider billing code, installment
/// count and the note appended to the charge description.
#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    pub amount: Decimal,
    pub billing_type: BillingType,
    pub max_installments: u32,
    pub note: Option<&'static str>,
}

impl Quote {
    /// Exempt registrations skip the payment leg entirely.
    pub fn is_exempt(&self) -> bool {
        self.amount.is_zero()
    }
}

/// Quote a registration by attendee age and desired payment method.
pub fn quote_for(age: u8, billing_type: BillingType) -> Quote {
    let (amount, note) = match age {
        0..=5 => (dec!(0), Some("Criança isenta de pagamento.")),
        6..=10 => (dec!(100), Some("Valor promocional para criança.")),
        _ => (dec!(150), None),
    };

    Quote {
        amount,
        billing_type,
        max_installments: 1,
        note,
    }
}
