mod common;

use common::{logging_init, sim_canceller};
use libmerlin2_rs::hardware::merlin2b::Merlin2b;
use libmerlin2_rs::{Bandwidth, Error};

#[test]
fn gain_profile_round_trips() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    dev.setup(2, 2, Bandwidth::Mhz80, false).unwrap();

    let profile = [-4.0, 0.0, 2.0, -2.0, 0.0, 2.0, -2.0, 0.0, 2.0, 0.0, -2.0];
    dev.set_gain_profile(&profile).unwrap();
    assert_eq!(profile.to_vec(), dev.get_gain_profile().unwrap());
    // standalone profiles are broadcast to both delay lines
    assert_eq!(profile, dev.delay_group(1).unwrap().gains().unwrap());
}

#[test]
fn chained_gain_profile_splits_across_the_lines() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    dev.setup(1, 1, Bandwidth::Mhz80, true).unwrap();

    // entries 11 and 12 land on the second line's low-delay taps
    let mut profile = vec![0.0; 22];
    profile[0] = -4.0;
    profile[11] = -2.0;
    profile[12] = -4.0;
    profile[13] = 2.0;
    dev.set_gain_profile(&profile).unwrap();
    assert_eq!(profile, dev.get_gain_profile().unwrap());
    assert_eq!(-2.0, dev.delay_group(1).unwrap().gains().unwrap()[0]);
    assert_eq!(-4.0, dev.delay_group(1).unwrap().gains().unwrap()[1]);
}

#[test]
fn gain_profile_rejects_unsupported_steps() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    dev.setup(2, 2, Bandwidth::Mhz80, false).unwrap();
    let good = [0.0; 11];
    dev.set_gain_profile(&good).unwrap();

    // -4 dB only exists on the first two taps
    let mut bad = [0.0; 11];
    bad[5] = -4.0;
    assert!(matches!(
        dev.set_gain_profile(&bad),
        Err(Error::OutOfRange(_))
    ));
    // 2 dB does not exist on the first two taps
    let mut bad = [0.0; 11];
    bad[1] = 2.0;
    assert!(matches!(
        dev.set_gain_profile(&bad),
        Err(Error::OutOfRange(_))
    ));
    // wrong length
    assert!(matches!(
        dev.set_gain_profile(&[0.0; 22]),
        Err(Error::Argument(_))
    ));
    // the failed updates left the profile untouched
    assert_eq!(vec![0.0; 11], dev.get_gain_profile().unwrap());
}

#[test]
fn vga_gain_quantizes_to_the_nearest_table_entry() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    dev.setup(2, 2, Bandwidth::Mhz80, false).unwrap();

    dev.set_vga_gain(1.0, Some(0)).unwrap();
    assert_eq!(1.50, dev.get_vga_gain(0).unwrap());
    dev.set_vga_gain(-2.0, None).unwrap();
    assert_eq!(-1.81, dev.get_vga_gain(0).unwrap());
    assert_eq!(-1.81, dev.get_vga_gain(1).unwrap());

    assert!(matches!(
        dev.set_vga_gain(7.0, None),
        Err(Error::OutOfRange(_))
    ));
    assert!(matches!(
        dev.set_vga_gain(0.0, Some(2)),
        Err(Error::Argument(_))
    ));
}

#[test]
fn vga_gain_table_is_sorted_ascending() {
    let table = Merlin2b::<common::SimCanceller, common::SimPin>::vga_gain_table();
    assert_eq!(-2.68, table[0]);
    assert_eq!(6.92, table[7]);
    assert!(table.windows(2).all(|w| w[0] < w[1]));
}
