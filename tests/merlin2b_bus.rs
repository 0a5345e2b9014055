mod common;

use common::{logging_init, sim_canceller};
use libmerlin2_rs::Error;

#[test]
fn full_word_write_and_read() {
    logging_init();
    let (mut dev, bus, _) = sim_canceller();
    dev.write_word(0x2004, 0x1990F).unwrap();
    assert_eq!(0x1990F, bus.peek(0x2004));
    assert_eq!(0x1990F, dev.read_word(0x2004).unwrap());
}

#[test]
fn masked_write_preserves_unrelated_bits() {
    logging_init();
    let (mut dev, bus, _) = sim_canceller();
    bus.poke(0x0004, 0xFFFF_0001);
    // rc_cal field of a delay line: 5 bits at position 5
    dev.write_field(0x0004, 0x10, 5, 0x3E0).unwrap();
    assert_eq!(0xFFFF_0201, bus.peek(0x0004));
    assert_eq!(0x10, dev.read_field(0x0004, 5, 0x3E0).unwrap());
}

#[test]
fn masked_write_over_multiple_words() {
    logging_init();
    let (mut dev, bus, _) = sim_canceller();
    bus.poke(0x0010, 0xA0);
    bus.poke(0x0014, 0xB0);
    dev.write(0x0010, &[0x1, 0x2], 0, 0xF).unwrap();
    assert_eq!(0xA1, bus.peek(0x0010));
    assert_eq!(0xB2, bus.peek(0x0014));
}

#[test]
fn bulk_write_lands_in_consecutive_registers() {
    logging_init();
    let (mut dev, bus, _) = sim_canceller();
    dev.write_words(0x003C, &[0x11, 0x22, 0x33]).unwrap();
    assert_eq!(0x11, bus.peek(0x003C));
    assert_eq!(0x22, bus.peek(0x0040));
    assert_eq!(0x33, bus.peek(0x0044));
    assert_eq!(vec![0x11, 0x22, 0x33], dev.read_words(0x003C, 3).unwrap());
}

#[test]
fn validation_happens_before_any_bus_access() {
    logging_init();
    let (mut dev, bus, _) = sim_canceller();
    assert!(matches!(
        dev.write_word(0x0002, 0x1),
        Err(Error::Argument(_))
    ));
    assert!(matches!(
        dev.write_word(0x8000, 0x1),
        Err(Error::Argument(_))
    ));
    assert!(matches!(
        dev.write_field(0x0004, 0x1, 32, 0x1),
        Err(Error::Argument(_))
    ));
    assert!(matches!(
        dev.write_field(0x0004, 0x1, 0, 0x0),
        Err(Error::Argument(_))
    ));
    assert!(matches!(
        dev.write_field(0x0004, 0x1, 16, 0xFFFF_0000),
        Err(Error::Argument(_))
    ));
    assert!(matches!(dev.read_words(0x0004, 0), Err(Error::Argument(_))));
    assert!(matches!(
        dev.read_words(0x0004, 8192),
        Err(Error::Argument(_))
    ));
    // nothing was written
    assert_eq!(0, bus.peek(0x0002));
    assert_eq!(0, bus.peek(0x0004));
}
