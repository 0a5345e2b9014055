mod common;

use common::{logging_init, sim_canceller};
use libmerlin2_rs::{Bandwidth, Complex64, Error, Weights};

#[test]
fn setup_then_zero_weights_round_trip() {
    logging_init();
    let (mut dev, _, apls) = sim_canceller();
    dev.setup(2, 2, Bandwidth::Mhz80, false).unwrap();
    assert!(!dev.chained());
    assert_eq!((12, 4), dev.weight_shape());

    let zeros = Weights::zeros(12, 4);
    let mapped = dev.set_weights(&zeros, false).unwrap();
    assert_eq!(zeros, mapped);
    dev.apply().unwrap();
    assert_eq!(zeros, dev.get_weights().unwrap());
    // one latch pulse from setup's weight clear, one from apply()
    assert_eq!(2, apls.rising_edges());
}

#[test]
fn setup_configures_the_signal_path() {
    logging_init();
    let (mut dev, bus, _) = sim_canceller();
    dev.setup(2, 1, Bandwidth::Mhz40, false).unwrap();

    // bandgap enabled, on-chip LO buffers off
    assert_eq!(0x1990F, bus.peek(0x2004));
    assert_eq!(0x7, bus.peek(0x200C));

    for line in 0..2 {
        let mut delay = dev.delay_group(line).unwrap();
        assert_eq!(Bandwidth::Mhz40, delay.bandwidth().unwrap());
        assert_eq!([true; 3], delay.enable().unwrap());
        assert_eq!(0x10, delay.rc_cal().unwrap());
        assert!(!delay.input_select().unwrap());
        let mut input = dev.input(line).unwrap();
        assert!(input.vga_enable().unwrap());
        assert_eq!(0.25, input.vga_gain().unwrap());
    }
    // default gain profile applied to both lines
    let profile = dev.get_gain_profile().unwrap();
    assert_eq!(
        vec![0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        profile
    );
    // only output 0 summing, second stage summer enable is active low
    assert!(dev.summer(0).unwrap().enable().unwrap());
    assert!(!dev.summer(1).unwrap().enable().unwrap());
    for inp in 0..2 {
        for out in 0..2 {
            assert!(dev.filter(inp, out).unwrap().enable().unwrap());
        }
    }
}

#[test]
fn chained_setup_selects_the_long_filter_shape() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    dev.setup(1, 1, Bandwidth::Mhz20, true).unwrap();
    assert!(dev.chained());
    assert_eq!((23, 2), dev.weight_shape());
    for line in 0..2 {
        assert!(dev.delay_group(line).unwrap().input_select().unwrap());
        assert_eq!([true; 3], dev.delay_group(line).unwrap().enable().unwrap());
    }
    // the seam tap of each second bank is force-disconnected by the clear
    for out in 0..2 {
        let taps = dev.filter(1, out).unwrap().get_weights().unwrap();
        assert!(taps[0].disconnect());
    }
}

#[test]
fn setup_rejects_bad_channel_counts() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    assert!(matches!(
        dev.setup(0, 1, Bandwidth::Mhz80, false),
        Err(Error::Argument(_))
    ));
    assert!(matches!(
        dev.setup(1, 3, Bandwidth::Mhz80, false),
        Err(Error::Argument(_))
    ));
}

#[test]
fn dc_offsets_round_trip_through_quantization() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    dev.setup(2, 2, Bandwidth::Mhz80, false).unwrap();

    let set = libmerlin2_rs::IqOffset::new(0.5, -0.25);
    let actual = dev.set_input_dc_offset(set, Some(0)).unwrap();
    assert!((actual.i - set.i).abs() <= 1.0 / 127.0);
    assert!((actual.q - set.q).abs() <= 1.0 / 127.0);
    assert_eq!(actual, dev.get_input_dc_offset(0).unwrap());

    // output 1 stores its fields bit-reversed, the API hides that
    let actual = dev.set_output_dc_offset(set, None).unwrap();
    assert!((actual.i - set.i).abs() <= 1.0 / 127.0);
    assert_eq!(actual, dev.get_output_dc_offset(0).unwrap());
    assert_eq!(actual, dev.get_output_dc_offset(1).unwrap());

    assert!(matches!(
        dev.set_input_dc_offset(libmerlin2_rs::IqOffset::new(1.5, 0.0), None),
        Err(Error::OutOfRange(_))
    ));
}

#[test]
fn weight_mapping_reports_the_quantized_values() {
    logging_init();
    let (mut dev, _, _) = sim_canceller();
    dev.setup(2, 2, Bandwidth::Mhz80, false).unwrap();

    let mut weights = Weights::zeros(12, 4);
    weights[(0, 0)] = Complex64::new(0.5, -0.5);
    weights[(3, 2)] = Complex64::new(1.0, -1.0);
    weights[(11, 1)] = Complex64::new(0.123, 0.456);
    let mapped = dev.set_weights(&weights, true).unwrap();
    assert!(weights.max_component_error(&mapped) <= 0.5 / 255.0 + 1e-12);
    assert_eq!(mapped, dev.get_weights().unwrap());
}
