use msiquery::models::{
    Image,
    ImageGeometry,
    PixelIndex,
    Spectrum,
    SpectrumFormat,
    SpectrumImage,
};
use msiquery::{
    BaselineCorrectionStrategy,
    NormalizationStrategy,
    SmoothingStrategy,
};
use proptest::prelude::*;

fn build(
    intensities: &[Vec<f32>],
    threads: usize,
    smoothing: SmoothingStrategy,
    baseline: BaselineCorrectionStrategy,
) -> SpectrumImage {
    let depth = intensities.first().map_or(0, |x| x.len());
    let axis: Vec<f64> = (0..depth).map(|i| 100.0 + i as f64).collect();
    let geometry = ImageGeometry::new([intensities.len(), 1, 1]);
    let spectra = intensities
        .iter()
        .enumerate()
        .map(|(i, ys)| Spectrum::new(PixelIndex::new(i as u32, 0, 0), ys.clone()))
        .collect();
    let mut image =
        SpectrumImage::new(SpectrumFormat::ContinuousProfile, geometry, axis, spectra).unwrap();
    let config = image.config_mut();
    config.set_threads(threads).unwrap();
    config.set_normalization(NormalizationStrategy::None);
    config.set_smoothing(smoothing, 2);
    config.set_baseline_correction(baseline, 3);
    image
}

fn dataset() -> impl Strategy<Value = Vec<Vec<f32>>> {
    (1usize..24, 1usize..16).prop_flat_map(|(n, depth)| {
        prop::collection::vec(prop::collection::vec(0.0f32..1000.0, depth), n)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_aggregates_do_not_depend_on_thread_count(
        intensities in dataset(),
        threads in 2usize..9,
        smoothing in prop::sample::select(SmoothingStrategy::ALL.to_vec()),
        baseline in prop::sample::select(BaselineCorrectionStrategy::ALL.to_vec()),
    ) {
        let mut single = build(&intensities, 1, smoothing, baseline);
        single.initialize_image_access().unwrap();
        let mut multi = build(&intensities, threads, smoothing, baseline);
        multi.initialize_image_access().unwrap();

        let a = single.sum_spectrum().unwrap();
        let b = multi.sum_spectrum().unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            prop_assert!((x - y).abs() <= 1e-9 * x.abs().max(1.0));
        }
        prop_assert_eq!(single.skyline_spectrum().unwrap(), multi.skyline_spectrum().unwrap());
        prop_assert_eq!(
            single.index_image().unwrap().as_slice(),
            multi.index_image().unwrap().as_slice()
        );

        let geometry = *single.geometry();
        let mut ion_a = Image::new(geometry, 0.0);
        let mut ion_b = Image::new(geometry, 0.0);
        single.grab_ion_image(101.0, 0.5, None, &mut ion_a).unwrap();
        multi.grab_ion_image(101.0, 0.5, None, &mut ion_b).unwrap();
        prop_assert_eq!(ion_a.as_slice(), ion_b.as_slice());
    }
}
