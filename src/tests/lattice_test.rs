use super::common::Session;
use crate::lattice::{LatticeError, SetLattice, EMPTY_SET};

#[test]
fn test_animal_scenario() {
    // S1 = dog(x), S2 = cat(x) with an asserted empty intersection;
    // S3 = animal(x) with S1 and S2 asserted subsets; the lower bound of
    // S3 covers both disjoint subsets
    let mut session = Session::new();
    let mut lattice = SetLattice::new(&mut session.bank);

    let dog = session.parse("dog($1)");
    let cat = session.parse("cat($1)");
    let animal = session.parse("animal($1)");
    let both = session.parse("dog($1) & cat($1)");

    let both_id = lattice.get_or_create(&mut session.bank, &both).unwrap();
    lattice.force_set_size(&mut session.bank, both_id, 0).unwrap();
    lattice.fix_size(both_id).unwrap();

    lattice.add_subset(&mut session.bank, &dog, &animal).unwrap();
    lattice.add_subset(&mut session.bank, &cat, &animal).unwrap();

    let dog_id = lattice.get_or_create(&mut session.bank, &dog).unwrap();
    let cat_id = lattice.get_or_create(&mut session.bank, &cat).unwrap();
    let animal_id = lattice.get_or_create(&mut session.bank, &animal).unwrap();

    assert!(lattice
        .are_disjoint(&mut session.bank, dog_id, cat_id)
        .unwrap());

    lattice.force_set_size(&mut session.bank, dog_id, 5).unwrap();
    lattice.force_set_size(&mut session.bank, cat_id, 7).unwrap();

    let lower = lattice
        .size_lower_bound(&mut session.bank, animal_id)
        .unwrap();
    assert!(lower >= 12);
}

#[test]
fn test_monotonicity_of_bounds() {
    // adding a subset edge never drops an upper bound below the current
    // size; removing it never raises a lower bound above it
    let mut session = Session::new();
    let mut lattice = SetLattice::new(&mut session.bank);
    let dog = session.parse("dog($1)");
    let animal = session.parse("animal($1)");

    lattice.add_subset(&mut session.bank, &dog, &animal).unwrap();
    let dog_id = lattice.get_or_create(&mut session.bank, &dog).unwrap();
    let animal_id = lattice.get_or_create(&mut session.bank, &animal).unwrap();

    let dog_size = lattice.size(dog_id).unwrap();
    let upper = lattice.size_upper_bound(&mut session.bank, dog_id).unwrap();
    assert!(upper >= dog_size);

    let animal_size = lattice.size(animal_id).unwrap();
    let lower = lattice
        .size_lower_bound(&mut session.bank, animal_id)
        .unwrap();
    assert!(lower <= animal_size);
}

#[test]
fn test_empty_set_reachability() {
    // every freshly created set sits above the empty set intensionally
    let mut session = Session::new();
    let mut lattice = SetLattice::new(&mut session.bank);
    let dog = session.parse("dog($1)");
    let both = session.parse("dog($1) & cat($1)");
    let dog_id = lattice.get_or_create(&mut session.bank, &dog).unwrap();
    let both_id = lattice.get_or_create(&mut session.bank, &both).unwrap();

    let mut stack = vec![dog_id];
    let mut seen = std::collections::HashSet::new();
    let mut found = false;
    while let Some(id) = stack.pop() {
        if id == EMPTY_SET {
            found = true;
            break;
        }
        if seen.insert(id) {
            stack.extend(lattice.intensional_children(id).iter().copied());
        }
    }
    assert!(found);
    // the conjunction sits between dog and the empty set
    assert!(lattice.intensional_children(dog_id).contains(&both_id));
}

#[test]
fn test_inconsistent_subset_is_rejected() {
    // fix animal to a size too small to hold its two disjoint subsets, then
    // assert the second subset edge
    let mut session = Session::new();
    let mut lattice = SetLattice::new(&mut session.bank);

    let dog = session.parse("dog($1)");
    let cat = session.parse("cat($1)");
    let animal = session.parse("animal($1)");
    let both = session.parse("dog($1) & cat($1)");

    let both_id = lattice.get_or_create(&mut session.bank, &both).unwrap();
    lattice.force_set_size(&mut session.bank, both_id, 0).unwrap();
    lattice.fix_size(both_id).unwrap();

    lattice.add_subset(&mut session.bank, &dog, &animal).unwrap();
    let dog_id = lattice.get_or_create(&mut session.bank, &dog).unwrap();
    let animal_id = lattice.get_or_create(&mut session.bank, &animal).unwrap();
    lattice.force_set_size(&mut session.bank, dog_id, 5).unwrap();
    lattice
        .force_set_size(&mut session.bank, animal_id, 6)
        .unwrap();
    lattice.fix_size(animal_id).unwrap();

    let cat_id = lattice.get_or_create(&mut session.bank, &cat).unwrap();
    lattice.force_set_size(&mut session.bank, cat_id, 7).unwrap();

    // cat alone already exceeds what animal can hold next to dog
    let result = lattice.add_subset(&mut session.bank, &cat, &animal);
    assert!(matches!(result, Err(LatticeError::Inconsistent)));
}

#[test]
fn test_set_size_bound_violation() {
    let mut session = Session::new();
    let mut lattice = SetLattice::new(&mut session.bank);
    let dog = session.parse("dog($1)");
    let animal = session.parse("animal($1)");
    lattice.add_subset(&mut session.bank, &dog, &animal).unwrap();
    let animal_id = lattice.get_or_create(&mut session.bank, &animal).unwrap();
    let dog_id = lattice.get_or_create(&mut session.bank, &dog).unwrap();
    lattice.force_set_size(&mut session.bank, dog_id, 8).unwrap();

    let result = lattice.set_size(&mut session.bank, animal_id, 2);
    assert!(matches!(result, Err(LatticeError::BoundViolation { .. })));
}
