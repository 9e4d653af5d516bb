pub fn render_schema() -> &'static str {
	include_str!("../../../sql/schema.sql")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_creates_providers_table() {
		let sql = render_schema();

		assert!(sql.contains("CREATE TABLE IF NOT EXISTS providers"));
		assert!(sql.contains("provider_id"));
	}
}
