use crate::payload::{ErasedPayload, ListPayload, Payload, PayloadKind};

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Health(u32);

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Heading {
    yaw: f32,
}

#[derive(Clone, Debug, Default, PartialEq, ListPayload)]
struct Inventory {
    owner: u32,
    slots: Vec<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, ListPayload)]
struct Waypoints(Vec<(i32, i32)>);

#[test]
fn test_type_indices_are_distinct_and_stable() {
    let health = Health::type_index();
    let heading = Heading::type_index();
    let inventory = Inventory::type_index();

    assert_ne!(health, heading);
    assert_ne!(health, inventory);
    assert_ne!(heading, inventory);
    assert_eq!(Health::type_index(), health);
}

#[test]
fn test_kinds() {
    assert_eq!(Health::KIND, PayloadKind::Field);
    assert_eq!(Inventory::KIND, PayloadKind::List);
    assert_eq!(Waypoints::KIND, PayloadKind::List);
}

#[test]
fn test_type_name() {
    assert!(Health::type_name().ends_with("Health"));
}

#[test]
fn test_list_items_named_field() {
    let inventory = Inventory {
        owner: 3,
        slots: vec![4, 5],
    };
    assert_eq!(inventory.items(), &[4, 5]);

    // Non-list fields fall back to their defaults
    let rebuilt = Inventory::from_items(vec![9]);
    assert_eq!(rebuilt.owner, 0);
    assert_eq!(rebuilt.slots, vec![9]);
}

#[test]
fn test_list_items_tuple_field() {
    let path = Waypoints::from_items(vec![(1, 2), (3, 4)]);
    assert_eq!(path.items().len(), 2);
    assert_eq!(path.0[1], (3, 4));
}

#[test]
fn test_erased_downcast() {
    let erased = ErasedPayload::new(Health(40));

    assert_eq!(erased.type_index(), Health::type_index());
    assert!(erased.is::<Health>());
    assert!(!erased.is::<Heading>());
    assert_eq!(erased.downcast::<Health>().unwrap(), Health(40));
}

#[test]
fn test_erased_downcast_wrong_type_hands_back() {
    let erased = ErasedPayload::new(Heading { yaw: 1.5 });

    let back = erased.downcast::<Health>().unwrap_err();
    assert_eq!(back.type_index(), Heading::type_index());
    assert_eq!(back.downcast::<Heading>().unwrap(), Heading { yaw: 1.5 });
}
