use huddle_scope::{
    assign_slot, instantiate, GlobalTemplates, Numbering, WristbandCard, WristbandRow,
    WristbandSettings,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

fn template() -> GlobalTemplates {
    let wristbands = WristbandSettings::default().with_card(
        WristbandCard::new("card1", "offense", Numbering::Sequential { start: 101 })
            .with_row(WristbandRow::header())
            .with_row(WristbandRow::play("7"))
            .with_row(WristbandRow::play("42")),
    );
    GlobalTemplates::new()
        .with_wristbands(wristbands.to_value())
        .with_depth_chart(json!({"QB": ["1", "12"], "RB": ["22"]}))
}

fn edit_rows(week: &mut Option<Value>, play: &str) {
    let value = week.as_mut().unwrap();
    let mut settings = WristbandSettings::from_value(value).unwrap();
    settings.cards[0].rows.push(WristbandRow::play(play));
    *value = settings.to_value();
}

#[test]
fn editing_a_week_leaves_template_and_siblings_alone() {
    let global = template();
    let pristine = global.clone();
    let w1 = instantiate("w1", None, &global);
    let mut w2 = instantiate("w2", Some(&w1), &global);

    edit_rows(&mut w2.wristbands, "99");
    w2.depth_chart.as_mut().unwrap()["QB"][0] = json!("5");

    assert_eq!(global, pristine);
    assert_eq!(w1.wristbands.as_ref(), Some(&pristine.wristbands));
    assert_eq!(w1.depth_chart.as_ref(), Some(&pristine.depth_chart));
}

#[test]
fn slot_scenario_on_an_instantiated_week() {
    let week = instantiate("w1", None, &template());
    let mut settings = WristbandSettings::from_value(week.wristbands.as_ref().unwrap()).unwrap();

    assert!(assign_slot(&mut settings, "card1", "9", 102).is_err());
    assert!(assign_slot(&mut settings, "card1", "9", 103).is_ok());
}

proptest! {
    #[test]
    fn prop_sibling_copies_are_independent(plays in prop::collection::vec("[0-9]{1,3}", 1..6)) {
        let global = template();
        let w1 = instantiate("w1", None, &global);
        let mut w2 = instantiate("w2", Some(&w1), &global);
        let before = w1.clone();

        for play in &plays {
            edit_rows(&mut w2.wristbands, play);
        }

        prop_assert_eq!(w1, before);
        prop_assert_eq!(global, template());
    }
}
