// StreamBase: control clamping, calling conventions, teardown.

mod common;

#[cfg(test)]
mod tests {
    use crate::common::{MockEngine, Probe};

    use opus_stream::config::StreamConfig;
    use opus_stream::constants::ctl;
    use opus_stream::engine::{self, EngineError};
    use opus_stream::stream::{ParallelWorkers, StreamBase, StreamContext};
    use opus_stream::types::{FrameGeometry, StreamError};

    fn geometry() -> FrameGeometry {
        FrameGeometry::new(48_000, 2, 960)
    }

    fn base_with(probe: &Probe) -> StreamBase {
        StreamBase::new(MockEngine::new(probe).boxed(), geometry())
    }

    #[test]
    fn bitrate_is_clamped_before_the_engine_sees_it() {
        let probe = Probe::default();
        let mut base = base_with(&probe);

        base.set_bitrate(500).unwrap();
        base.set_bitrate(999_999).unwrap();
        base.set_bitrate(64_000).unwrap();

        assert_eq!(
            probe.controls(),
            vec![(ctl::BITRATE, 16_000), (ctl::BITRATE, 128_000), (ctl::BITRATE, 64_000)]
        );
    }

    #[test]
    fn forward_error_correction_is_sent_as_one_or_zero() {
        let probe = Probe::default();
        let mut base = base_with(&probe);

        base.set_forward_error_correction(true).unwrap();
        base.set_forward_error_correction(false).unwrap();

        assert_eq!(
            probe.controls(),
            vec![(ctl::FORWARD_ERROR_CORRECTION, 1), (ctl::FORWARD_ERROR_CORRECTION, 0)]
        );
    }

    #[test]
    fn expected_packet_loss_uses_the_fec_code_as_a_percentage() {
        let probe = Probe::default();
        let mut base = base_with(&probe);

        base.set_expected_packet_loss(0.5).unwrap();
        assert_eq!(probe.last_control(), Some((ctl::FORWARD_ERROR_CORRECTION, 50)));
        base.set_expected_packet_loss(-1.0).unwrap();
        assert_eq!(probe.last_control(), Some((ctl::FORWARD_ERROR_CORRECTION, 0)));
        base.set_expected_packet_loss(2.0).unwrap();
        assert_eq!(probe.last_control(), Some((ctl::FORWARD_ERROR_CORRECTION, 100)));

        assert!(probe.controls().iter().all(|(code, _)| *code != ctl::EXPECTED_PACKET_LOSS));
    }

    #[test]
    fn config_controls_are_applied_in_order() {
        let probe = Probe::default();
        let mut base = base_with(&probe);
        let cfg = StreamConfig::new(48_000, 2)
            .with_bitrate(1)
            .with_fec(true)
            .with_packet_loss(0.25);

        base.apply_config_controls(&cfg).unwrap();

        assert_eq!(
            probe.controls(),
            vec![
                (ctl::BITRATE, 16_000),
                (ctl::FORWARD_ERROR_CORRECTION, 1),
                (ctl::FORWARD_ERROR_CORRECTION, 25),
            ]
        );
    }

    #[test]
    fn per_call_engines_receive_the_frame_size() {
        let probe = Probe::default();
        let mut base = StreamBase::new(MockEngine::new(&probe).per_call().boxed(), geometry());
        base.encode_one(&[1, 2, 3, 4]).unwrap();
        base.decode_one(&[5, 6]).unwrap();
        assert_eq!(probe.frame_sizes(), vec![Some(960), Some(960)]);
    }

    #[test]
    fn inferring_engines_receive_no_frame_size() {
        let probe = Probe::default();
        let mut base = base_with(&probe);
        let packet = base.encode_one(&[1, 2, 3, 4]).unwrap();
        assert_eq!(&packet[..], &[1, 2, 3, 4]);
        assert_eq!(probe.frame_sizes(), vec![None]);
    }

    #[test]
    fn per_call_decoder_without_frame_size_passes_none() {
        let probe = Probe::default();
        let mut base = StreamBase::new(
            MockEngine::new(&probe).per_call().boxed(),
            FrameGeometry::new(48_000, 2, 0),
        );
        base.decode_one(&[1]).unwrap();
        assert_eq!(probe.frame_sizes(), vec![None]);
    }

    #[test]
    fn finalize_is_idempotent_and_disposes_once() {
        let probe = Probe::default();
        let mut base = StreamBase::new(MockEngine::new(&probe).disposable().boxed(), geometry());

        base.finalize();
        base.finalize();
        assert!(base.is_finalized());
        drop(base);

        assert_eq!(probe.disposed(), 1);
    }

    #[test]
    fn drop_disposes_exactly_once() {
        let probe = Probe::default();
        {
            let _base = StreamBase::new(MockEngine::new(&probe).disposable().boxed(), geometry());
        }
        assert_eq!(probe.disposed(), 1);
    }

    #[test]
    fn self_managing_engines_are_not_disposed() {
        let probe = Probe::default();
        let mut base = base_with(&probe);
        base.finalize();
        assert_eq!(probe.disposed(), 0);
    }

    #[test]
    fn calls_after_finalize_report_released() {
        let probe = Probe::default();
        let mut base = base_with(&probe);
        base.finalize();

        assert!(matches!(base.encode_one(&[0, 0]), Err(StreamError::Engine(EngineError::Released))));
        assert!(matches!(base.set_bitrate(32_000), Err(StreamError::Engine(EngineError::Released))));
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn parallel_context_holds_one_lease_per_stream() {
        let probe = Probe::default();
        let workers = ParallelWorkers::new();
        let ctx = StreamContext::new(workers.clone());

        let mut a = StreamBase::with_context(
            MockEngine::new(&probe).parallel_capable().boxed(),
            geometry(),
            true,
            &ctx,
        );
        let b = StreamBase::with_context(MockEngine::new(&probe).boxed(), geometry(), true, &ctx);
        let _c = StreamBase::with_context(MockEngine::new(&probe).boxed(), geometry(), false, &ctx);

        assert_eq!(workers.active(), 2);
        assert!(probe.parallel());

        a.finalize();
        a.finalize();
        assert_eq!(workers.active(), 1);
        drop(a);
        drop(b);
        assert!(!workers.is_enabled());
    }

    #[test]
    fn engine_type_reports_the_registry_default() {
        assert_eq!(StreamBase::engine_type(), engine::default_engine());
    }

    #[test]
    fn pinned_raw_engine_is_built_from_config() {
        let cfg = StreamConfig::new(48_000, 2).with_engine(engine::EngineKind::Raw);
        let base = StreamBase::from_config(&cfg, geometry(), &StreamContext::default()).unwrap();
        assert_eq!(base.kind(), engine::EngineKind::Raw);
    }

    #[cfg(not(feature = "libopus"))]
    #[test]
    fn missing_engine_is_a_configuration_error() {
        let cfg = StreamConfig::new(48_000, 2);
        let err = StreamBase::from_config(&cfg, geometry(), &StreamContext::default()).unwrap_err();
        assert!(matches!(err, StreamError::Configuration(_)));
    }
}
