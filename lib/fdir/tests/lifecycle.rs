// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Flow director and ntuple filter lifecycle tests.

use fdir::api::EEXIST;
use fdir::api::EINVAL;
use fdir::api::ENOTSUP;
use fdir::engine::build_template;
use fdir_test_utils::*;

fn searcher(ipv4: bool, ipv6: bool, tcp: bool, udp: bool) -> ArfsConfig {
    ArfsConfig { enable: true, ipv4, ipv6, tcp, udp }
}

#[test]
fn add_then_delete() {
    let (mut dev, log) = dev(test_cfg(4));
    let f = tcp4(2, 80, 1);

    dev.add_fdir_filter(&f).unwrap();
    assert_eq!(dev.filter_count(), 1);
    assert!(dev.classification_enabled());
    let tmpl = build_template(&f.input).unwrap();
    expect_calls!(
        dev.hw(),
        [
            HwCall::Arfs(ArfsConfig {
                enable: true,
                ipv4: true,
                tcp: true,
                ..
            }),
            HwCall::Ntuple { rx_queue: 1, add: true, .. },
        ]
    );
    assert_eq!(dev.hw().installed(), vec![tmpl.as_bytes().to_vec()]);

    dev.del_fdir_filter(&f).unwrap();
    assert_eq!(dev.filter_count(), 0);
    assert!(!dev.classification_enabled());
    assert!(dev.hw().installed().is_empty());
    assert_eq!(
        dev.hw().calls().last(),
        Some(&HwCall::Arfs(ArfsConfig::default()))
    );
    assert!(log.contains(LogLevel::Note, "searcher disabled"));
}

#[test]
fn duplicate_add_is_noop() {
    let (mut dev, _log) = dev(test_cfg(4));
    let f = udp4(9, 53, 0);

    dev.add_fdir_filter(&f).unwrap();
    let ncalls = dev.hw().calls().len();
    dev.add_fdir_filter(&f).unwrap();
    assert_eq!(dev.hw().calls().len(), ncalls);
    assert_eq!(dev.filter_count(), 1);

    // The queue is not part of the match.
    dev.add_fdir_filter(&udp4(9, 53, 3)).unwrap();
    assert_eq!(dev.filter_count(), 1);
}

#[test]
fn searcher_widens_with_kinds() {
    let (mut dev, _log) = dev(test_cfg(4));

    dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    dev.add_fdir_filter(&tcp4(3, 80, 0)).unwrap();
    dev.add_fdir_filter(&udp6(2, 53, 0)).unwrap();
    assert_eq!(dev.filters().arfs(), searcher(true, true, true, true));

    let arfs: Vec<_> = dev
        .hw()
        .calls()
        .iter()
        .filter_map(|c| match c {
            HwCall::Arfs(a) => Some(*a),
            _ => None,
        })
        .collect();
    assert_eq!(
        arfs,
        vec![
            searcher(true, false, true, false),
            searcher(true, true, true, true)
        ]
    );

    // Removing a kind does not narrow the searcher.
    dev.del_fdir_filter(&udp6(2, 53, 0)).unwrap();
    assert_eq!(dev.filters().arfs(), searcher(true, true, true, true));
}

#[test]
fn delete_uses_stored_queue() {
    let (mut dev, _log) = dev(test_cfg(8));
    dev.add_fdir_filter(&tcp6(5, 443, 6)).unwrap();
    dev.hw_mut().take_calls();

    dev.del_fdir_filter(&tcp6(5, 443, 0)).unwrap();
    assert!(matches!(
        dev.hw().calls().first(),
        Some(HwCall::Ntuple { rx_queue: 6, add: false, .. })
    ));
}

#[test]
fn delete_missing() {
    let (mut dev, log) = dev(test_cfg(4));
    dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    dev.hw_mut().take_calls();

    let err = dev.del_fdir_filter(&tcp4(2, 81, 0)).unwrap_err();
    assert_eq!(err, FdirError::FilterNotFound);
    assert_eq!(err.to_errno(), EEXIST);
    expect_calls!(dev.hw(), []);
    assert!(log.contains(LogLevel::Error, "not found"));
}

#[test]
fn capacity_holds_one_slot_back() {
    let cfg = FdirCfg { max_filters: 4, ..test_cfg(2) };
    let (mut dev, _log) = dev(cfg);

    for last in 2..5 {
        dev.add_fdir_filter(&udp4(last, 53, 0)).unwrap();
    }
    assert_eq!(dev.filter_count(), 3);
    dev.hw_mut().take_calls();

    let err = dev.add_fdir_filter(&udp4(5, 53, 0)).unwrap_err();
    assert_eq!(err, FdirError::MaxCapacity(4));
    assert_eq!(err.to_errno(), EINVAL);
    assert_eq!(dev.filter_count(), 3);
    assert!(dev.hw().calls().is_empty(), "{:?}", dev.hw().calls());

    // The check comes first, even for a filter already installed.
    assert_eq!(
        dev.add_fdir_filter(&udp4(2, 53, 0)),
        Err(FdirError::MaxCapacity(4))
    );
    assert!(dev.hw().calls().is_empty(), "{:?}", dev.hw().calls());
}

#[test]
fn add_rejections() {
    let (mut dev, log) = dev(test_cfg(2));

    assert_eq!(
        dev.add_fdir_filter(&tcp4(2, 80, 2)),
        Err(FdirError::InvalidQueue { queue: 2, max: 2 })
    );

    let mut f = tcp4(2, 80, 0);
    f.input.from_vf = true;
    assert_eq!(dev.add_fdir_filter(&f), Err(FdirError::UnsupportedSource));

    let mut f = tcp4(2, 80, 0);
    f.input.flow_type = FlowType::Ipv4Sctp;
    assert_eq!(
        dev.add_fdir_filter(&f),
        Err(FdirError::UnsupportedFlow(FlowType::Ipv4Sctp))
    );

    let mut f = tcp4(2, 80, 0);
    f.input.dst_ip = ip6([0xfd00, 0, 0, 0, 0, 0, 0, 1]);
    assert_eq!(
        dev.add_fdir_filter(&f),
        Err(FdirError::UnsupportedFlow(FlowType::Ipv4Tcp))
    );

    assert_eq!(dev.filter_count(), 0);
    expect_calls!(dev.hw(), []);
    assert!(log.contains(LogLevel::Error, "add rejected"));
}

#[test]
fn failed_first_add_disables_searcher() {
    let (mut dev, _log) = dev(test_cfg(4));
    dev.hw_mut().fail(HwOp::NtupleAdd, -5);

    let err = dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap_err();
    assert_eq!(err, FdirError::Hardware { rc: -5 });
    assert_eq!(dev.filter_count(), 0);
    assert!(!dev.classification_enabled());
    expect_calls!(
        dev.hw(),
        [
            HwCall::Arfs(ArfsConfig { enable: true, .. }),
            HwCall::Ntuple { add: true, .. },
            HwCall::Arfs(ArfsConfig { enable: false, .. }),
        ]
    );
}

#[test]
fn installed_filter_forces_perfect_mode() {
    let (mut dev, _log) = dev(test_cfg(4));
    assert_eq!(dev.fdir_mode(), FdirMode::None);

    dev.hw_mut().fail(HwOp::NtupleAdd, -5);
    assert!(dev.add_fdir_filter(&tcp4(2, 80, 0)).is_err());
    assert_eq!(dev.fdir_mode(), FdirMode::None);

    dev.hw_mut().unfail(HwOp::NtupleAdd);
    dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    assert_eq!(dev.fdir_mode(), FdirMode::Perfect);
    assert_eq!(dev.dump().mode, FdirMode::Perfect);

    // Removing the last filter leaves the mode alone.
    dev.del_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    assert_eq!(dev.dump().mode, FdirMode::Perfect);
}

#[test]
fn failed_add_keeps_searcher_for_others() {
    let (mut dev, _log) = dev(test_cfg(4));
    dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    dev.hw_mut().fail(HwOp::NtupleAdd, -16);

    assert!(dev.add_fdir_filter(&tcp4(3, 80, 0)).is_err());
    assert_eq!(dev.filter_count(), 1);
    assert!(dev.classification_enabled());
}

#[test]
fn failed_searcher_config() {
    let (mut dev, _log) = dev(test_cfg(4));
    dev.hw_mut().fail(HwOp::Arfs, -22);

    let err = dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap_err();
    assert_eq!(err, FdirError::Hardware { rc: -22 });
    assert_eq!(dev.filter_count(), 0);
    expect_calls!(dev.hw(), [HwCall::Arfs(_)]);
}

#[test]
fn delete_failure_release() {
    let (mut dev, log) = dev(test_cfg(4));
    dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    dev.add_fdir_filter(&tcp4(3, 80, 0)).unwrap();
    dev.hw_mut().fail(HwOp::NtupleDel, -5);

    dev.del_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    assert_eq!(dev.filter_count(), 1);
    assert!(log.contains(LogLevel::Warn, "releasing it anyway"));
}

#[test]
fn delete_failure_retain() {
    let cfg = FdirCfg {
        delete_policy: DeleteFailurePolicy::Retain,
        ..test_cfg(4)
    };
    let (mut dev, _log) = dev(cfg);
    dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    dev.hw_mut().fail(HwOp::NtupleDel, -5);

    assert_eq!(
        dev.del_fdir_filter(&tcp4(2, 80, 0)),
        Err(FdirError::Hardware { rc: -5 })
    );
    assert_eq!(dev.filter_count(), 1);
    assert!(dev.classification_enabled());

    dev.hw_mut().unfail(HwOp::NtupleDel);
    dev.del_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    assert_eq!(dev.filter_count(), 0);
}

#[test]
fn release_touches_no_hardware() {
    let (mut dev, _log) = dev(test_cfg(4));
    dev.add_fdir_filter(&tcp4(2, 80, 0)).unwrap();
    dev.add_fdir_filter(&udp4(2, 53, 1)).unwrap();
    dev.hw_mut().take_calls();

    assert_eq!(dev.release_filters(), 2);
    assert_eq!(dev.filter_count(), 0);
    assert!(!dev.classification_enabled());
    expect_calls!(dev.hw(), []);
    assert_eq!(dev.release_filters(), 0);
}

#[test]
fn ntuple_goes_through_fdir() {
    let (mut dev, _log) = dev(test_cfg(4));
    let nt = NtupleFilter {
        proto: PROTO_SCTP,
        src_ip: Ipv4Addr::from_const([10, 0, 0, 1]),
        dst_ip: Ipv4Addr::from_const([10, 0, 0, 2]),
        src_port: 4000,
        dst_port: 53,
        queue: 1,
    };

    dev.filter_ctrl(&FilterReq::Ntuple(FilterOp::Add, nt)).unwrap();
    assert_eq!(dev.filter_count(), 1);

    // A non-TCP ntuple filter is installed as UDP.
    let mut udp = udp4(2, 53, 1).input;
    udp.proto = Some(PROTO_UDP);
    let tmpl = build_template(&udp).unwrap();
    assert_eq!(dev.hw().installed(), vec![tmpl.as_bytes().to_vec()]);

    dev.filter_ctrl(&FilterReq::Ntuple(FilterOp::Delete, nt)).unwrap();
    assert_eq!(dev.filter_count(), 0);

    assert_eq!(
        dev.filter_ctrl(&FilterReq::Ntuple(FilterOp::Flush, nt))
            .unwrap_err()
            .to_errno(),
        ENOTSUP
    );
}

#[test]
fn support_queries() {
    let (mut dev, _log) = dev(test_cfg(4));
    let f = tcp4(2, 80, 0);

    assert_eq!(dev.check_fdir_support(FdirMode::Perfect), Ok(()));
    assert_eq!(dev.fdir_mode(), FdirMode::Perfect);
    assert_eq!(dev.check_fdir_support(FdirMode::None), Ok(()));
    assert_eq!(dev.fdir_mode(), FdirMode::None);
    assert!(matches!(
        dev.check_fdir_support(FdirMode::Signature),
        Err(FdirError::NotSupported(_))
    ));

    dev.filter_ctrl(&FilterReq::Fdir(FilterOp::Nop, f)).unwrap();
    let err = dev.filter_ctrl(&FilterReq::Fdir(FilterOp::Update, f));
    assert_eq!(err.unwrap_err().to_errno(), ENOTSUP);

    let cfg = FdirCfg { cmt: true, ..test_cfg(4) };
    let (mut dev, _log) = fdir_test_utils::dev(cfg);
    assert!(matches!(
        dev.check_fdir_support(FdirMode::Perfect),
        Err(FdirError::NotSupported(_))
    ));
    assert_eq!(dev.fdir_mode(), FdirMode::None);
    assert!(dev.filter_ctrl(&FilterReq::Fdir(FilterOp::Nop, f)).is_err());
    expect_calls!(dev.hw(), []);
}

#[test]
fn other_filter_types_invalid() {
    let (mut dev, _log) = dev(test_cfg(4));
    for ft in [FilterType::Ethertype, FilterType::Hash, FilterType::Generic] {
        let err = dev
            .filter_ctrl(&FilterReq::Other(ft, FilterOp::Add))
            .unwrap_err();
        assert!(matches!(err, FdirError::Invalid(_)), "{ft}");
        assert_eq!(err.to_errno(), EINVAL);
    }
}

#[test]
fn dump_in_insertion_order() {
    let (mut dev, _log) = dev(test_cfg(4));
    let filters = [udp4(9, 53, 3), tcp4(2, 80, 1), tcp6(4, 22, 2)];
    for f in &filters {
        dev.add_fdir_filter(f).unwrap();
    }

    let dump = dev.dump();
    assert_eq!(dump.name, "fdirtest0");
    assert_eq!(dump.count, 3);
    assert_eq!(dump.max, 256);
    let queues: Vec<_> = dump.filters.iter().map(|e| e.rx_queue).collect();
    assert_eq!(queues, vec![3, 1, 2]);
    for (entry, f) in dump.filters.iter().zip(&filters) {
        let tmpl = build_template(&f.input).unwrap();
        assert_eq!(entry.pkt, tmpl.as_bytes());
        assert_eq!(entry.pkt_len, tmpl.len());
    }
    assert_eq!(dump.tunnels.len(), 3);
    assert!(dump.tunnels.iter().all(|t| !t.enabled));

    let mut out = vec![];
    fdir::print::print_fdir_into(&mut out, &dump).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Filters (3/256)"));
    assert!(out.contains("ipv4,ipv6,tcp,udp"));
}
