/// Background task implementations
use crate::{
    admin::deletion::{DEPENDENT_RECORDS, PRIMARY_RECORDS},
    context::AppContext,
    error::HubResult,
};

/// Health check - verify the store is reachable
pub async fn health_check(ctx: &AppContext) -> HubResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

/// Delete rows whose owning account no longer has an auth record.
///
/// Covers the same tables the deletion workflow erases, in the same order,
/// so a deletion that failed part way is finished here.
pub async fn reconcile_orphans(ctx: &AppContext) -> HubResult<u64> {
    let mut removed = 0;

    for (table, column) in DEPENDENT_RECORDS.iter().chain(PRIMARY_RECORDS) {
        let sql = format!(
            "DELETE FROM {table} WHERE {column} IS NOT NULL AND {column} NOT IN (SELECT id FROM auth_users)"
        );
        let result = sqlx::query(&sql).execute(&ctx.db).await?;

        if result.rows_affected() > 0 {
            tracing::info!(
                "Removed {} orphaned rows from {}.{}",
                result.rows_affected(),
                table,
                column
            );
        }
        removed += result.rows_affected();
    }

    Ok(removed)
}
