use super::entities::Stat;

/// Normalises stats coming from the item detail endpoint.
///
/// Fixed-value stats arrive with `max == 0`; they take `min` as their max. The
/// starting roll is the floored midpoint of the range.
pub fn prepare_stats(stats: &[Stat]) -> Vec<Stat> {
    stats
        .iter()
        .map(|stat| {
            let max = if stat.max != 0.0 { stat.max } else { stat.min };
            Stat {
                max,
                value: ((stat.min + max) / 2.0).floor(),
                ..stat.clone()
            }
        })
        .collect()
}

/// Replaces the roll at `index`. Returns `false` when there is no such stat.
pub fn set_stat_value(stats: &mut [Stat], index: usize, value: f64) -> bool {
    match stats.get_mut(index) {
        Some(stat) => {
            stat.value = value;
            true
        }
        None => false,
    }
}

pub fn stat_by_name<'a>(stats: &'a [Stat], name: &str) -> Option<&'a Stat> {
    stats.iter().find(|stat| stat.name == name)
}
