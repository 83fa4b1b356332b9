//! Built-in adventures.

use skald_core::{Combatant, EndCondition};

use crate::config::{AdventureSpec, SceneSpec};

/// Name of the boss whose defeat wins "The Crypt of the Shadow Lord".
pub const SHADOW_LORD: &str = "Shadow Lord";

/// The four-member party.
pub fn party() -> Vec<Combatant> {
    vec![
        Combatant::new("Thorin", 28)
            .with_ac(16)
            .with_attribute("str", 16)
            .with_attribute("con", 14)
            .with_attack(5, "1d8+3")
            .with_resource("second_wind", 1),
        Combatant::new("Elara", 18)
            .with_ac(12)
            .with_attribute("int", 17)
            .with_attribute("dex", 14)
            .with_attack(5, "1d10")
            .with_resource("spell_slots", 4),
        Combatant::new("Shadow", 21)
            .with_ac(14)
            .with_attribute("dex", 17)
            .with_attack(5, "1d6+3"),
        Combatant::new("Aldric", 24)
            .with_ac(18)
            .with_attribute("wis", 16)
            .with_attribute("str", 14)
            .with_attack(4, "1d6+2")
            .with_resource("spell_slots", 4),
    ]
}

/// A skeleton guard.
pub fn skeleton(name: &str) -> Combatant {
    Combatant::new(name, 13)
        .with_ac(13)
        .with_attribute("dex", 14)
        .with_attack(4, "1d6+2")
}

/// The boss of the final scene.
pub fn shadow_lord() -> Combatant {
    Combatant::new(SHADOW_LORD, 55)
        .with_ac(15)
        .with_attribute("str", 16)
        .with_attack(6, "1d8+3")
}

/// "The Crypt of the Shadow Lord": a village, a crypt guarded by skeletons
/// and the Shadow Lord's chamber. Won by defeating the Shadow Lord in the
/// final scene.
pub fn crypt_of_the_shadow_lord() -> AdventureSpec {
    AdventureSpec {
        name: "crypt-of-the-shadow-lord".to_string(),
        party: party(),
        initiative_order: ["DungeonMaster", "Thorin", "Elara", "Shadow", "Aldric"]
            .into_iter()
            .map(String::from)
            .collect(),
        scenes: vec![
            SceneSpec::new("The Village of Millhaven"),
            SceneSpec::new("Crypt Entrance")
                .with_enemies(vec![skeleton("Skeleton Guard 1"), skeleton("Skeleton Guard 2")]),
            SceneSpec::new("The Shadow Lord's Chamber").with_enemies(vec![shadow_lord()]),
        ],
        end_condition: EndCondition::boss(SHADOW_LORD, 2),
    }
}

/// Healing notation used by the party's cleric.
pub const CURE_WOUNDS: &str = "1d8+3";

/// Name of the party's healer.
pub const HEALER: &str = "Aldric";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypt_layout() {
        let adventure = crypt_of_the_shadow_lord();
        assert_eq!(adventure.scenes.len(), 3);
        assert_eq!(adventure.initiative_order[0], "DungeonMaster");
        assert_eq!(adventure.scenes[1].enemies.len(), 2);
        assert_eq!(adventure.scenes[2].enemies[0].name, SHADOW_LORD);
        assert_eq!(adventure.scene(2).map(|s| s.title.as_str()), Some("The Shadow Lord's Chamber"));
        assert!(adventure.scene(3).is_none());
    }

    #[test]
    fn every_party_member_takes_turns() {
        let adventure = crypt_of_the_shadow_lord();
        for member in &adventure.party {
            assert!(adventure.initiative_order.contains(&member.name), "{}", member.name);
            assert!(member.validate().is_ok());
        }
        assert!(adventure.party.iter().any(|m| m.name == HEALER));
    }

    #[test]
    fn modifiers_follow_ability_scores() {
        let thorin = &party()[0];
        assert_eq!(thorin.modifier("STR"), 3);
        assert_eq!(thorin.modifier("cha"), 0);
    }
}
