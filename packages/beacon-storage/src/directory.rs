use sqlx::PgPool;
use uuid::Uuid;

use crate::{Result, models::ProviderCard};

/// Resolves display cards for `provider_ids`. Ids with no directory row are
/// simply missing from the result; the caller decides whether that is fatal.
pub async fn provider_cards(pool: &PgPool, provider_ids: &[Uuid]) -> Result<Vec<ProviderCard>> {
	if provider_ids.is_empty() {
		return Ok(Vec::new());
	}

	let cards = sqlx::query_as::<_, ProviderCard>(
		"\
SELECT provider_id, display_name, kind, career, other_ability, vehicle, offsite_work
FROM providers
WHERE provider_id = ANY($1)",
	)
	.bind(provider_ids)
	.fetch_all(pool)
	.await?;

	Ok(cards)
}

pub async fn upsert_provider(pool: &PgPool, card: &ProviderCard) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO providers (provider_id, display_name, kind, career, other_ability, vehicle, offsite_work)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (provider_id) DO UPDATE SET
	display_name = EXCLUDED.display_name,
	kind = EXCLUDED.kind,
	career = EXCLUDED.career,
	other_ability = EXCLUDED.other_ability,
	vehicle = EXCLUDED.vehicle,
	offsite_work = EXCLUDED.offsite_work,
	updated_at = NOW()",
	)
	.bind(card.provider_id)
	.bind(&card.display_name)
	.bind(&card.kind)
	.bind(&card.career)
	.bind(&card.other_ability)
	.bind(card.vehicle)
	.bind(card.offsite_work)
	.execute(pool)
	.await?;

	Ok(())
}
