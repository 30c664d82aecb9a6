//! Ready-made character profiles.

use super::profile::{CharacterProfile, Health, Personality, Skill, SocialContext, Wealth};
use std::collections::BTreeMap;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn skill(name: &str, level: i64, description: &str) -> Skill {
    Skill {
        name: name.to_string(),
        level,
        description: description.to_string(),
    }
}

/// The demo character: Zhuge Liang at the Wu Zhang Yuan camp.
#[must_use]
pub fn demo_character() -> CharacterProfile {
    let mut profile = CharacterProfile::new("Zhuge Liang");
    profile.context = SocialContext {
        world_view: "End of the Eastern Han dynasty, the Three Kingdoms period. \
                     You serve the state of Shu Han."
            .to_string(),
        occupation: "Prime Minister of Shu Han".to_string(),
        current_location: "Wu Zhang Yuan Army Camp".to_string(),
    };
    profile.personality = Personality {
        traits: BTreeMap::from([
            ("Caution".to_string(), 9),
            ("Loyalty".to_string(), 10),
            ("Wisdom".to_string(), 10),
        ]),
        values: strings(&[
            "Restore the Han dynasty",
            "Repay the late emperor's trust",
            "Govern with strict and fair law",
        ]),
        mood: "Worried about the northern campaign".to_string(),
        growth_history: strings(&[
            "Left the thatched cottage after three visits from Liu Bei",
            "Accepted the regency at Baidicheng",
            "Pacified the southern tribes",
        ]),
    };
    profile.wealth = Wealth {
        currency: 500.0,
        assets: strings(&[
            "Crane-feather Fan",
            "Wooden Ox Blueprints",
            "24 volumes of military texts",
        ]),
    };
    profile.health = Health {
        hp: 60,
        stamina: 40,
        status_effects: strings(&["Overworked", "Coughing blood"]),
    };
    profile.skills = vec![
        skill(
            "Strategy & Formation",
            10,
            "Master of battlefield tactics and the Eight Trigrams formation",
        ),
        skill("Astrology", 8, "Reads fate and weather from the stars"),
        skill("Debate", 9, "Overcame the scholars of Wu in open argument"),
    ];
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_character_shape() {
        let profile = demo_character();
        assert_eq!(profile.name, "Zhuge Liang");
        assert_eq!(profile.personality.traits.get("Wisdom"), Some(&10));
        assert_eq!(profile.skills.len(), 3);
        assert_eq!(profile.health.hp, 60);
        assert!(profile.relationships.is_empty());
        assert!(profile.daily_log.is_empty());
    }
}
