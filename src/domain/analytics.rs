//! Pure derivations over the analytics counters.

/// Click-through rate in percent for a clicks/impressions pair.
///
/// Defined as `clicks / impressions * 100`, and `0.0` when there are no
/// impressions. Every mutation of either counter must persist the value
/// this function yields for the post-mutation pair; the Postgres upserts
/// in `infra::db::analytics` encode the same expression in SQL.
pub fn click_through_rate(clicks: i64, impressions: i64) -> f64 {
    if impressions <= 0 {
        return 0.0;
    }
    clicks as f64 / impressions as f64 * 100.0
}
