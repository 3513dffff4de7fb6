use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rs5_common::mmio::{IMAGE_INPUT_BASE, IMAGE_OUTPUT_BASE};
use rs5_core::DriverError;
use rs5_core::arith::{ArithmeticPlugin, expected_add, fibonacci_reference};
use rs5_core::image::{ImageConversionPlugin, ImageRegion, ProgressMonitor, convert_pixel};
use rs5_core::map::RegisterMap;
use rs5_core::session::{NoProgress, PollBudget};
use rs5_hw::{ImageUnit, PlatformLayout, SimulatedSoc};

fn platform() -> (SimulatedSoc, PlatformLayout) {
    let layout = PlatformLayout::default();
    let soc = SimulatedSoc::platform(&layout).unwrap();
    (soc, layout)
}

fn image_plugin(soc: &mut SimulatedSoc, base: usize) -> ImageConversionPlugin<&mut SimulatedSoc> {
    ImageConversionPlugin::new(soc, RegisterMap::region(base).unwrap()).unwrap()
}

#[test]
fn two_by_two_image_end_to_end() {
    let (mut soc, layout) = platform();
    soc.load_words(
        IMAGE_INPUT_BASE,
        &[0xFF00_0000, 0x00FF_0000, 0x0000_FF00, 0x8080_8000],
    );
    let region = ImageRegion::contiguous(
        IMAGE_INPUT_BASE as u32,
        IMAGE_OUTPUT_BASE as u32,
        2,
        2,
    )
    .unwrap();

    let mut monitor = ProgressMonitor::for_region(&region);
    let report = image_plugin(&mut soc, layout.image_base)
        .convert_observed(region, &mut monitor)
        .unwrap();

    assert_eq!(report.progress, 4);
    assert!(report.is_complete());
    assert!(monitor.holds());
    assert_eq!(monitor.last(), 4);
    assert_eq!(
        soc.dump_words(IMAGE_OUTPUT_BASE, 4),
        vec![0x3F3F_3F00, 0x3F3F_3F00, 0x3F3F_3F00, 0x6060_6000]
    );
}

#[test]
fn single_pixel_image() {
    let (mut soc, layout) = platform();
    soc.load_words(IMAGE_INPUT_BASE, &[0xAABB_CC00]);
    let report = image_plugin(&mut soc, layout.image_base)
        .convert_buffers(IMAGE_INPUT_BASE as u32, IMAGE_OUTPUT_BASE as u32, 1, 1)
        .unwrap();
    assert_eq!(report.progress, 1);
    assert_eq!(soc.dump_words(IMAGE_OUTPUT_BASE, 1), vec![0x8C8C_8C00]);
}

#[test]
fn empty_image_is_rejected_before_the_bus() {
    let (mut soc, layout) = platform();
    let result = image_plugin(&mut soc, layout.image_base).convert_buffers(
        IMAGE_INPUT_BASE as u32,
        IMAGE_OUTPUT_BASE as u32,
        0,
        3,
    );
    assert!(matches!(result, Err(DriverError::InvalidConfiguration(_))));
    assert_eq!(soc.bus_reads() + soc.bus_writes(), 0);
}

#[test]
fn adder_fibonacci_and_pixel_units() {
    let (mut soc, layout) = platform();

    let mut adder =
        ArithmeticPlugin::adder(&mut soc, RegisterMap::arithmetic(layout.adder_base).unwrap())
            .unwrap();
    assert_eq!(adder.add(2, 3), Ok(10));
    assert_eq!(adder.add(0xFFFF_FFFB, 0xFFFF_FFFD), Ok(0xFFFF_FFFD));
    assert_eq!(adder.add_signed(-20, 7), Ok(-8));

    let mut fib = ArithmeticPlugin::fibonacci_unit(
        &mut soc,
        RegisterMap::sequence(layout.fibonacci_base).unwrap(),
    )
    .unwrap();
    assert_eq!(fib.fibonacci(0), Ok(0));
    assert_eq!(fib.fibonacci(1), Ok(1));
    assert_eq!(fib.fibonacci(10), Ok(55));
    assert_eq!(fib.fibonacci(15), Ok(610));

    let mut pixel =
        ArithmeticPlugin::pixel_unit(&mut soc, RegisterMap::arithmetic(layout.pixel_base).unwrap())
            .unwrap();
    assert_eq!(pixel.grayscale(0xAABB_CC00), Ok(0x8C8C_8C00));
    assert_eq!(pixel.grayscale(0x8080_80FF), Ok(0x6060_6000));
}

#[test]
fn stuck_busy_times_out_after_exactly_the_budget() {
    let (mut soc, layout) = platform();
    soc.set_stuck_busy(layout.adder_base, true).unwrap();

    let mut adder =
        ArithmeticPlugin::adder(&mut soc, RegisterMap::arithmetic(layout.adder_base).unwrap())
            .unwrap()
            .with_budget(PollBudget::new(50));
    assert_eq!(adder.add(1, 2), Err(DriverError::Timeout { polls: 50 }));
    assert_eq!(soc.bus_reads(), 50);

    soc.set_stuck_busy(layout.adder_base, false).unwrap();
    let mut adder =
        ArithmeticPlugin::adder(&mut soc, RegisterMap::arithmetic(layout.adder_base).unwrap())
            .unwrap();
    let session = adder.session_mut();
    assert_eq!(session.wait(&mut NoProgress), Ok(expected_add(1, 2)));
}

#[test]
fn configuration_while_busy_writes_nothing() {
    let (mut soc, layout) = platform();
    soc.set_stuck_busy(layout.image_base, true).unwrap();
    let region =
        ImageRegion::contiguous(IMAGE_INPUT_BASE as u32, IMAGE_OUTPUT_BASE as u32, 4, 4).unwrap();

    {
        let mut plugin = image_plugin(&mut soc, layout.image_base);
        plugin.configure(&region).unwrap();
        plugin.start().unwrap();
    }
    let writes_before = soc.device_writes(layout.image_base).unwrap();
    assert_eq!(writes_before, 7);

    let mut plugin = image_plugin(&mut soc, layout.image_base);
    assert!(plugin.status().unwrap().busy);
    assert!(matches!(
        plugin.configure(&region),
        Err(DriverError::InvalidConfiguration(_))
    ));
    assert_eq!(soc.device_writes(layout.image_base).unwrap(), writes_before);
    assert_eq!(soc.ignored_writes(layout.image_base).unwrap(), 0);
}

#[test]
fn instances_at_disjoint_bases_are_independent() {
    let mut soc = SimulatedSoc::new();
    let (base_a, base_b) = (0x1000_0000, 0x1000_0100);
    soc.attach(base_a, ImageUnit::new(1)).unwrap();
    soc.attach(base_b, ImageUnit::new(2)).unwrap();

    let input_a: Vec<u32> = (0..6).map(|i| 0x1020_3000 * i).collect();
    let input_b: Vec<u32> = (0..9).map(|i| 0xFF00_FF00 - i * 0x0101_0100).collect();
    soc.load_words(0x8000_2000, &input_a);
    soc.load_words(0x8000_4000, &input_b);
    let region_a = ImageRegion::contiguous(0x8000_2000, 0x8000_3000, 3, 2).unwrap();
    let region_b = ImageRegion::contiguous(0x8000_4000, 0x8000_5000, 3, 3).unwrap();

    {
        let mut b = image_plugin(&mut soc, base_b);
        b.configure(&region_b).unwrap();
        b.start().unwrap();
    }
    let report_a = image_plugin(&mut soc, base_a).convert(region_a).unwrap();
    let final_b = image_plugin(&mut soc, base_b).wait(&mut NoProgress).unwrap();

    assert_eq!(report_a.progress, 6);
    assert_eq!(final_b, 9);
    let expect = |input: &[u32]| input.iter().map(|&p| convert_pixel(p)).collect::<Vec<_>>();
    assert_eq!(soc.dump_words(0x8000_3000, 6), expect(&input_a));
    assert_eq!(soc.dump_words(0x8000_5000, 9), expect(&input_b));
}

#[test]
fn random_image_matches_the_software_reduction() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0005);
    let (width, height) = (17u32, 11u32);
    let pixels: Vec<u32> = (0..width * height).map(|_| rng.r#gen()).collect();

    let layout = PlatformLayout {
        pixels_per_tick: 3,
        ..PlatformLayout::default()
    };
    let mut soc = SimulatedSoc::platform(&layout).unwrap();
    soc.load_words(IMAGE_INPUT_BASE, &pixels);

    let report = image_plugin(&mut soc, layout.image_base)
        .convert_buffers(IMAGE_INPUT_BASE as u32, IMAGE_OUTPUT_BASE as u32, width, height)
        .unwrap();

    assert!(report.is_complete());
    let expected: Vec<u32> = pixels.iter().map(|&p| convert_pixel(p)).collect();
    assert_eq!(soc.dump_words(IMAGE_OUTPUT_BASE, pixels.len()), expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn progress_is_bounded_and_monotone(
        width in 1u32..12,
        height in 1u32..12,
        pixels_per_tick in 1u32..5,
    ) {
        let layout = PlatformLayout { pixels_per_tick, ..PlatformLayout::default() };
        let mut soc = SimulatedSoc::platform(&layout).unwrap();
        let region = ImageRegion::contiguous(
            IMAGE_INPUT_BASE as u32,
            IMAGE_OUTPUT_BASE as u32,
            width,
            height,
        ).unwrap();

        let mut monitor = ProgressMonitor::for_region(&region);
        let report = image_plugin(&mut soc, layout.image_base)
            .convert_observed(region, &mut monitor)
            .unwrap();

        prop_assert!(monitor.holds());
        prop_assert_eq!(monitor.last(), width * height);
        prop_assert_eq!(report.progress, width * height);
    }

    #[test]
    fn adder_matches_the_reference(a in any::<u32>(), b in any::<u32>()) {
        let (mut soc, layout) = platform();
        let mut adder = ArithmeticPlugin::adder(
            &mut soc,
            RegisterMap::arithmetic(layout.adder_base).unwrap(),
        ).unwrap();
        prop_assert_eq!(adder.add(a, b), Ok(expected_add(a, b)));
    }

    #[test]
    fn fibonacci_matches_the_reference(n in 0u32..400) {
        let (mut soc, layout) = platform();
        let mut fib = ArithmeticPlugin::fibonacci_unit(
            &mut soc,
            RegisterMap::sequence(layout.fibonacci_base).unwrap(),
        ).unwrap();
        prop_assert_eq!(fib.fibonacci(n), Ok(fibonacci_reference(n)));
    }
}
