use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::promotion::{self, Entity as PromotionEntity, Model as PromotionModel, PromotionType},
    errors::ServiceError,
};

fn is_valid_percentage(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}

/// Picks the one promotion that applies at `now`.
///
/// Only active promotions whose `[start_time, end_time)` window contains `now`
/// qualify; the highest `discount_value` wins. Equal discounts are settled by
/// the earlier `start_time`, then the smaller id, so the result does not depend
/// on the order promotions were loaded in.
pub fn select_best(promotions: &[PromotionModel], now: DateTime<Utc>) -> Option<&PromotionModel> {
    promotions
        .iter()
        .filter(|p| p.is_running_at(now))
        .filter(|p| is_valid_percentage(p.discount_value))
        .min_by(|a, b| {
            b.discount_value
                .cmp(&a.discount_value)
                .then_with(|| a.start_time.cmp(&b.start_time))
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Input for creating a promotion (seeding and tests)
#[derive(Clone, Debug)]
pub struct NewPromotion {
    pub name: String,
    pub description: String,
    pub discount_value: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct PromotionService {
    db_pool: Arc<DbPool>,
}

impl PromotionService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Reads the promotions running at `now` straight from the store.
    #[instrument(skip(self))]
    pub async fn current_promotions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PromotionModel>, ServiceError> {
        let db = &*self.db_pool;
        let promotions = PromotionEntity::find()
            .filter(promotion::Column::IsActive.eq(true))
            .filter(promotion::Column::StartTime.lte(now))
            .filter(promotion::Column::EndTime.gt(now))
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load promotions");
                ServiceError::DatabaseError(e)
            })?;

        for promo in promotions
            .iter()
            .filter(|p| !is_valid_percentage(p.discount_value))
        {
            warn!(
                promotion_id = %promo.id,
                discount_value = %promo.discount_value,
                "Ignoring promotion with a discount outside 0-100%"
            );
        }

        debug!(count = promotions.len(), "Loaded running promotions");
        Ok(promotions)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_promotion(
        &self,
        input: NewPromotion,
    ) -> Result<PromotionModel, ServiceError> {
        if !is_valid_percentage(input.discount_value) {
            return Err(ServiceError::InvalidInput(
                "Discount must be between 0 and 100 percent".to_string(),
            ));
        }
        if input.end_time <= input.start_time {
            return Err(ServiceError::InvalidInput(
                "Promotion must end after it starts".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let model = promotion::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            promotion_type: Set(PromotionType::PercentDiscount),
            discount_value: Set(input.discount_value),
            start_time: Set(input.start_time),
            end_time: Set(input.end_time),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(promotion_id = %model.id, discount = %model.discount_value, "Promotion created");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn promo(discount: Decimal, start_offset_h: i64, end_offset_h: i64, active: bool) -> PromotionModel {
        let now = Utc::now();
        PromotionModel {
            id: Uuid::new_v4(),
            name: format!("{discount}% off"),
            description: String::new(),
            promotion_type: PromotionType::PercentDiscount,
            discount_value: discount,
            start_time: now + Duration::hours(start_offset_h),
            end_time: now + Duration::hours(end_offset_h),
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn picks_highest_running_discount() {
        let promos = vec![
            promo(dec!(10), -1, 1, true),
            promo(dec!(25), -1, 1, true),
            promo(dec!(15), -1, 1, true),
        ];
        let best = select_best(&promos, Utc::now()).unwrap();
        assert_eq!(best.discount_value, dec!(25));
    }

    #[test]
    fn ignores_inactive_and_out_of_window() {
        let promos = vec![
            promo(dec!(50), -1, 1, false),
            promo(dec!(40), 1, 2, true),
            promo(dec!(30), -2, -1, true),
            promo(dec!(5), -1, 1, true),
        ];
        let best = select_best(&promos, Utc::now()).unwrap();
        assert_eq!(best.discount_value, dec!(5));
    }

    #[test]
    fn window_end_is_exclusive() {
        let p = promo(dec!(10), -1, 1, true);
        assert!(select_best(std::slice::from_ref(&p), p.start_time).is_some());
        assert!(select_best(std::slice::from_ref(&p), p.end_time).is_none());
    }

    #[test]
    fn no_promotions_selects_nothing() {
        assert!(select_best(&[], Utc::now()).is_none());
    }

    #[test]
    fn ties_prefer_earliest_start_then_id() {
        let early = promo(dec!(20), -5, 5, true);
        let late = promo(dec!(20), -1, 5, true);
        let now = Utc::now();

        let forward = vec![early.clone(), late.clone()];
        let backward = vec![late.clone(), early.clone()];
        assert_eq!(select_best(&forward, now).unwrap().id, early.id);
        assert_eq!(select_best(&backward, now).unwrap().id, early.id);

        let mut twin = early.clone();
        twin.id = Uuid::new_v4();
        let expected = early.id.min(twin.id);
        assert_eq!(select_best(&[early.clone(), twin.clone()], now).unwrap().id, expected);
        assert_eq!(select_best(&[twin, early], now).unwrap().id, expected);
    }

    #[test]
    fn out_of_range_discounts_are_skipped() {
        let promos = vec![promo(dec!(150), -1, 1, true), promo(dec!(10), -1, 1, true)];
        assert_eq!(
            select_best(&promos, Utc::now()).unwrap().discount_value,
            dec!(10)
        );
    }

    proptest! {
        #[test]
        fn selection_ignores_input_order(
            discounts in proptest::collection::vec(0u32..=100, 1..8),
            rotate in 0usize..8,
        ) {
            let now = Utc::now();
            let promos: Vec<PromotionModel> = discounts
                .iter()
                .map(|d| promo(Decimal::from(*d), -1, 1, true))
                .collect();
            let mut rotated = promos.clone();
            let len = rotated.len();
            rotated.rotate_left(rotate % len);

            let a = select_best(&promos, now).map(|p| p.id);
            let b = select_best(&rotated, now).map(|p| p.id);
            prop_assert_eq!(a, b);

            let max = discounts.iter().max().copied().map(Decimal::from);
            prop_assert_eq!(select_best(&promos, now).map(|p| p.discount_value), max);
        }
    }
}
