use lextrail_common::get_current_timestamp;

use crate::models::Achievement;

/// Default badge ladder, keyed on completed laws. (name, description, icon,
/// laws completed).
pub const SEED: [(&str, &str, &str, i64); 9] = [
    (
        "Primeiro Passo",
        "Parabéns! Você começou sua jornada.",
        "fas fa-shoe-prints",
        5,
    ),
    (
        "Estudante Dedicado",
        "O esforço já é visível. Parabéns pela constância!",
        "fas fa-book-reader",
        10,
    ),
    (
        "Leitor de Leis",
        "Agora você é um verdadeiro decifrador de artigos.",
        "fas fa-glasses",
        20,
    ),
    (
        "Operador do Saber",
        "Seu conhecimento começa a operar mudanças.",
        "fas fa-cogs",
        30,
    ),
    (
        "Mestre em Formação",
        "Sua bagagem está cada vez mais robusta.",
        "fas fa-graduation-cap",
        50,
    ),
    (
        "Mestre das Normas",
        "Padrões, princípios e regras não têm segredos pra você.",
        "fas fa-balance-scale",
        75,
    ),
    (
        "Guardião das Leis",
        "Sua dedicação é digna de uma toga.",
        "fas fa-gavel",
        100,
    ),
    (
        "Mentor da Lei",
        "Você inspira outros estudantes a seguirem seu exemplo.",
        "fas fa-chalkboard-teacher",
        150,
    ),
    (
        "Uma lenda!",
        "Um verdadeiro mito entre os estudiosos.",
        "fas fa-crown",
        200,
    ),
];

/// Catalog rows load ordered by `created_at`, so the seed staggers the
/// timestamps to keep the ladder order stable.
pub fn seed_achievements() -> Vec<Achievement> {
    let base = get_current_timestamp();
    SEED.iter()
        .enumerate()
        .map(|(index, (name, description, icon, threshold))| {
            let mut achievement =
                Achievement::for_completions(name, description, Some(icon), *threshold);
            achievement.created_at = base + index as i64;
            achievement.updated_at = achievement.created_at;
            achievement
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_ladder_is_ascending() {
        let catalog = seed_achievements();
        assert_eq!(catalog.len(), 9);

        let thresholds: Vec<i64> = catalog
            .iter()
            .filter_map(|a| a.laws_completed_threshold)
            .collect();
        assert_eq!(thresholds.len(), 9);
        assert!(thresholds.windows(2).all(|pair| pair[0] < pair[1]));

        assert!(catalog
            .windows(2)
            .all(|pair| pair[0].created_at < pair[1].created_at));
    }

    #[test]
    fn seed_names_are_unique() {
        let catalog = seed_achievements();
        let mut names: Vec<&str> = catalog.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), catalog.len());
    }
}
