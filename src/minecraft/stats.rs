use serde_json::Value;

/// Reads a statistic from a player's stats file
///
/// Files of 1.13 and later nest namespaced keys (`stats.minecraft:mined.minecraft:stone`),
/// older ones use flat keys (`stat.mineBlock.minecraft.stone`).
pub fn find_stat(stats: &Value, version: u8, category: &str, stat: &str) -> Option<u64> {
    let value = if version >= 13 {
        stats
            .get("stats")?
            .get(format!("minecraft:{category}"))?
            .get(format!("minecraft:{stat}"))?
    } else {
        stats.get(format!("stat.{category}.minecraft.{stat}"))?
    };

    value.as_u64()
}

/// Play time is counted in ticks
fn is_play_time(stat: &str) -> bool {
    matches!(stat, "play_time" | "play_one_minute" | "time_played")
}

/// The sentence shown below the player's name
pub fn describe(category: &str, stat: &str, value: u64) -> String {
    match category {
        "custom" if is_play_time(stat) => {
            format!(
                "has played for **{:.2}** hours",
                value as f64 / 20.0 / 60.0 / 60.0
            )
        }
        "custom" => format!("**{stat} {value}**"),
        "killed_by" => format!("was killed **{value}** times by a **{stat}**"),
        _ => format!("has **{category} {value} {stat}s**"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn modern() -> Value {
        json!({
            "stats": {
                "minecraft:mined": { "minecraft:stone": 120 },
                "minecraft:custom": { "minecraft:play_time": 144000 },
            },
            "DataVersion": 3120
        })
    }

    fn legacy() -> Value {
        json!({
            "stat.mined.minecraft.stone": 12,
            "stat.custom.minecraft.jump": 3
        })
    }

    #[test_case(modern(), 19, "mined", "stone", Some(120) ; "Modern")]
    #[test_case(modern(), 19, "mined", "dirt", None ; "Modern missing stat")]
    #[test_case(modern(), 19, "crafted", "stone", None ; "Modern missing category")]
    #[test_case(legacy(), 12, "mined", "stone", Some(12) ; "Legacy")]
    #[test_case(legacy(), 12, "custom", "walk", None ; "Legacy missing")]
    #[test_case(legacy(), 19, "mined", "stone", None ; "Legacy file read as modern")]
    fn finds_stats(stats: Value, version: u8, category: &str, stat: &str, expected: Option<u64>) {
        assert_eq!(find_stat(&stats, version, category, stat), expected);
    }

    #[test_case("custom", "play_time", 144000, "has played for **2.00** hours" ; "Play time")]
    #[test_case("custom", "jump", 3, "**jump 3**" ; "Custom")]
    #[test_case("killed_by", "zombie", 4, "was killed **4** times by a **zombie**" ; "Killed by")]
    #[test_case("mined", "stone", 120, "has **mined 120 stones**" ; "Generic")]
    fn descriptions(category: &str, stat: &str, value: u64, expected: &str) {
        assert_eq!(describe(category, stat, value), expected);
    }
}
