use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Fallback percentages applied when no active settings row exists.
pub const DEFAULT_DEALER_PERCENTAGE: u32 = 60;
pub const DEFAULT_PLATFORM_PERCENTAGE: u32 = 40;

/// Versioned revenue split configuration. Exactly one row is active at any
/// time; activation deactivates all others in the same database transaction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RevenueSplitSettings {
    pub id: Uuid,
    pub dealer_percentage: Decimal,
    pub platform_percentage: Decimal,
    pub is_active: bool,
    pub effective_from: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RevenueSplitSettings {
    pub fn new(dealer_percentage: Decimal, platform_percentage: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            dealer_percentage,
            platform_percentage,
            is_active: true,
            effective_from: now,
            created_at: now,
        }
    }

    /// Documented fallback used when no settings row is active.
    pub fn default_split() -> Self {
        Self::new(
            Decimal::from(DEFAULT_DEALER_PERCENTAGE),
            Decimal::from(DEFAULT_PLATFORM_PERCENTAGE),
        )
    }

    /// Percentages must be non-negative and sum to exactly 100.
    pub fn validate(&self) -> Result<()> {
        if self.dealer_percentage < Decimal::ZERO || self.platform_percentage < Decimal::ZERO {
            return Err(AppError::InvalidSplitConfig(format!(
                "negative percentage: dealer {}, platform {}",
                self.dealer_percentage, self.platform_percentage
            )));
        }
        if self.dealer_percentage + self.platform_percentage != Decimal::ONE_HUNDRED {
            return Err(AppError::InvalidSplitConfig(format!(
                "percentages must sum to 100, got dealer {} + platform {}",
                self.dealer_percentage, self.platform_percentage
            )));
        }
        Ok(())
    }
}

/// Proportional division of one completed payment between the dealer and the
/// platform. One row exists per source transaction; the rounding remainder is
/// always assigned to the platform share so the two amounts reconstruct the
/// total exactly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RevenueSplit {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub total_amount: Decimal,
    pub dealer_amount: Decimal,
    pub platform_amount: Decimal,
    pub dealer_percentage: Decimal,
    pub platform_percentage: Decimal,
    pub dealer_wallet_id: Uuid,
    pub dealer_credited: bool,
    pub dealer_credited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RevenueSplit {
    /// Computes the split amounts from the active settings.
    pub fn compute(
        transaction_id: Uuid,
        dealer_wallet_id: Uuid,
        total_amount: Decimal,
        settings: &RevenueSplitSettings,
    ) -> Result<Self> {
        settings.validate()?;
        if total_amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "cannot split non-positive amount {}",
                total_amount
            )));
        }

        let dealer_amount =
            (total_amount * settings.dealer_percentage / Decimal::ONE_HUNDRED).round_dp(2);
        let platform_amount = total_amount - dealer_amount;

        Ok(Self {
            id: Uuid::new_v4(),
            transaction_id,
            total_amount,
            dealer_amount,
            platform_amount,
            dealer_percentage: settings.dealer_percentage,
            platform_percentage: settings.platform_percentage,
            dealer_wallet_id,
            dealer_credited: false,
            dealer_credited_at: None,
            created_at: Utc::now(),
        })
    }

    pub fn mark_dealer_credited(&mut self) {
        self.dealer_credited = true;
        self.dealer_credited_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings(dealer: Decimal, platform: Decimal) -> RevenueSplitSettings {
        RevenueSplitSettings::new(dealer, platform)
    }

    #[test]
    fn test_settings_validation() {
        assert!(settings(dec!(60), dec!(40)).validate().is_ok());
        assert!(settings(dec!(72.5), dec!(27.5)).validate().is_ok());

        let err = settings(dec!(60), dec!(50)).validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidSplitConfig(_)));

        let err = settings(dec!(110), dec!(-10)).validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidSplitConfig(_)));
    }

    #[test]
    fn test_default_split_is_sixty_forty() {
        let default = RevenueSplitSettings::default_split();
        assert_eq!(default.dealer_percentage, dec!(60));
        assert_eq!(default.platform_percentage, dec!(40));
        assert!(default.validate().is_ok());
    }

    #[test]
    fn test_inspection_fee_split() {
        let split = RevenueSplit::compute(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(5000),
            &settings(dec!(60), dec!(40)),
        )
        .unwrap();

        assert_eq!(split.dealer_amount, dec!(3000));
        assert_eq!(split.platform_amount, dec!(2000));
        assert_eq!(split.dealer_amount + split.platform_amount, dec!(5000));
        assert!(!split.dealer_credited);
    }

    #[test]
    fn test_rounding_remainder_goes_to_platform() {
        // 33% of 100.01 rounds to 33.00; the platform absorbs the remainder.
        let split = RevenueSplit::compute(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(100.01),
            &settings(dec!(33), dec!(67)),
        )
        .unwrap();

        assert_eq!(split.dealer_amount, dec!(33.00));
        assert_eq!(split.platform_amount, dec!(67.01));
        assert_eq!(
            split.dealer_amount + split.platform_amount,
            split.total_amount
        );
    }

    #[test]
    fn test_split_reconstructs_total_for_awkward_percentages() {
        for (total, dealer_pct) in [
            (dec!(0.01), dec!(50)),
            (dec!(99.99), dec!(33.33)),
            (dec!(12345.67), dec!(72.5)),
            (dec!(1), dec!(1)),
        ] {
            let split = RevenueSplit::compute(
                Uuid::new_v4(),
                Uuid::new_v4(),
                total,
                &settings(dealer_pct, Decimal::ONE_HUNDRED - dealer_pct),
            )
            .unwrap();
            assert_eq!(
                split.dealer_amount + split.platform_amount,
                total,
                "total {} dealer_pct {}",
                total,
                dealer_pct
            );
        }
    }

    #[test]
    fn test_split_rejects_invalid_settings() {
        let err = RevenueSplit::compute(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(5000),
            &settings(dec!(55), dec!(55)),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidSplitConfig(_)));
    }

    #[test]
    fn test_split_rejects_non_positive_amount() {
        let err = RevenueSplit::compute(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decimal::ZERO,
            &settings(dec!(60), dec!(40)),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_mark_dealer_credited() {
        let mut split = RevenueSplit::compute(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(5000),
            &settings(dec!(60), dec!(40)),
        )
        .unwrap();
        split.mark_dealer_credited();
        assert!(split.dealer_credited);
        assert!(split.dealer_credited_at.is_some());
    }
}
