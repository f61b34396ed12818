//! End-to-end tests for the bit stream engine and its value codecs.

use oxibit_core::{
    BitStream, BitStreamOptions, ForwardReader, ForwardWriter, OxiBitError, StreamAccess,
    StreamMode,
};
use std::io::Cursor;

fn written(f: impl FnOnce(&mut BitStream<Cursor<Vec<u8>>>)) -> Vec<u8> {
    let mut stream = BitStream::writer(Cursor::new(Vec::new())).unwrap();
    f(&mut stream);
    stream.into_inner().unwrap().into_inner()
}

#[test]
fn test_scenario_mixed_widths() {
    let fields: [(u32, u32); 15] = [
        (10, 7),
        (0xBEEF_BEEF, 32),
        (12, 7),
        (0x1337_1337, 32),
        (123, 7),
        (0xDEAD_C0DE, 32),
        (0, 7),
        (111, 7),
        (1, 1),
        (2, 2),
        (7, 3),
        (14, 4),
        (21, 5),
        (42, 6),
        (14406, 15),
    ];

    let bytes = written(|s| {
        for &(value, bits) in &fields {
            s.write(value, bits).unwrap();
        }
    });
    let total_bits: u32 = fields.iter().map(|&(_, bits)| bits).sum();
    assert_eq!(bytes.len(), total_bits.div_ceil(8) as usize);

    let mut stream = BitStream::reader(Cursor::new(bytes)).unwrap();
    for &(value, bits) in &fields {
        assert_eq!(stream.read::<u32>(bits).unwrap(), value, "{bits}-bit field");
    }
}

#[test]
fn test_scenario_signed_and_wide() {
    let bytes = written(|s| {
        s.write(1337u16, 15).unwrap();
        s.write(-21_474_836_480i64, 60).unwrap();
        s.write(-1i32, 30).unwrap();
        s.write_bool(false).unwrap();
        s.write(0xDE_DEADu32, 27).unwrap();
    });

    let mut stream = BitStream::reader(Cursor::new(bytes)).unwrap();
    assert_eq!(stream.read_signed::<i16>(15).unwrap(), 1337);
    assert_eq!(stream.read_signed::<i64>(60).unwrap(), -21_474_836_480);
    assert_eq!(stream.read_signed::<i32>(30).unwrap(), -1);
    assert!(!stream.read_bool().unwrap());
    assert_eq!(stream.read::<u32>(27).unwrap(), 0xDE_DEAD);
}

#[test]
fn test_roundtrip_every_width() {
    for bits in 1..=64u32 {
        let max = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        let values = [0, 1, max / 3, max - 1, max];

        // Offset by 5 bits so wide values straddle cache words
        let bytes = written(|s| {
            s.write(0u8, 5).unwrap();
            for &v in &values {
                s.write(v, bits).unwrap();
            }
        });

        let mut stream = BitStream::reader(Cursor::new(bytes)).unwrap();
        stream.read::<u8>(5).unwrap();
        for &v in &values {
            assert_eq!(stream.read::<u64>(bits).unwrap(), v & max, "width {bits}");
        }
    }
}

#[test]
fn test_signed_roundtrip_every_width() {
    for bits in 2..=64u32 {
        let min = -(1i128 << (bits - 1)) as i64;
        let max = ((1i128 << (bits - 1)) - 1) as i64;
        let values = [min, -1, 0, 1, max];

        let bytes = written(|s| {
            s.write_bool(true).unwrap();
            for &v in &values {
                s.write(v, bits).unwrap();
            }
        });

        let mut stream = BitStream::reader(Cursor::new(bytes)).unwrap();
        assert!(stream.read_bool().unwrap());
        for &v in &values {
            assert_eq!(stream.read_signed::<i64>(bits).unwrap(), v, "width {bits}");
        }
    }
}

#[test]
fn test_bit_exact_packing() {
    for (w1, w2) in [(1, 1), (3, 5), (7, 9), (12, 20), (31, 1), (13, 6)] {
        let bytes = written(|s| {
            s.write_word(1, w1).unwrap();
            s.write_word(1, w2).unwrap();
        });
        assert_eq!(bytes.len(), (w1 + w2).div_ceil(8) as usize, "{w1}+{w2}");
    }
}

#[test]
fn test_lsb_first_layout() {
    let bytes = written(|s| {
        s.write_word(0b1, 1).unwrap();
        s.write_word(0b011, 3).unwrap();
        s.write_word(0xA, 4).unwrap();
        s.write_word(0x1234, 16).unwrap();
    });
    assert_eq!(bytes, [0xA7, 0x34, 0x12]);
}

#[test]
fn test_cache_boundary_transparency() {
    let value: u64 = 0x0ABC_DEF0_1234_5678;
    let whole = written(|s| {
        s.write_word(0x5_5555, 20).unwrap();
        s.write_bits(value, 60).unwrap();
    });
    let bitwise = written(|s| {
        s.write_word(0x5_5555, 20).unwrap();
        for i in 0..60 {
            s.write_word(((value >> i) & 1) as u32, 1).unwrap();
        }
    });
    assert_eq!(whole, bitwise);
}

#[test]
fn test_overflow_truncates_by_default() {
    let bytes = written(|s| s.write(0x1FFu32, 8).unwrap());
    assert_eq!(bytes, [0xFF]);

    let bytes = written(|s| s.write(-300i32, 8).unwrap());
    assert_eq!(bytes, [(-300i32 & 0xFF) as u8]);
}

#[test]
fn test_overflow_raises_when_enabled() {
    let options = BitStreamOptions::WRITE_ONLY.with_throw_on_overflow(StreamAccess::WRITE);
    let mut stream = BitStream::with_options(Cursor::new(Vec::new()), options).unwrap();

    assert!(matches!(
        stream.write(0x1FFu32, 8),
        Err(OxiBitError::Overflow { value: 0x1FF, bits: 8 })
    ));
    assert!(stream.write(-128i8, 8).is_ok());
    assert!(stream.write(-129i16, 8).is_err());
    assert!(stream.write(200u8, 8).is_ok());
}

#[test]
fn test_end_of_stream_policy() {
    let mut stream = BitStream::reader(Cursor::new(vec![0xFF])).unwrap();
    assert_eq!(stream.read::<u16>(12).unwrap(), 0x0FF);

    let options = BitStreamOptions::READ_ONLY.with_throw_on_overflow(StreamAccess::READ);
    let mut stream = BitStream::with_options(Cursor::new(vec![0xFF]), options).unwrap();
    assert!(matches!(
        stream.read::<u16>(12),
        Err(OxiBitError::EndOfStream {
            requested: 12,
            available: 8
        })
    ));
}

#[test]
fn test_sign_extension() {
    let bytes = written(|s| {
        s.write_word(0b1_0110, 5).unwrap();
        s.write_word(0b1_0110, 5).unwrap();
        s.write_bits(1 << 39, 40).unwrap();
    });

    let mut stream = BitStream::reader(Cursor::new(bytes)).unwrap();
    assert_eq!(stream.read_bits(5, true).unwrap() as i64, -10);
    assert_eq!(stream.read_bits(5, false).unwrap(), 0b1_0110);
    assert_eq!(stream.read_bits(40, true).unwrap() as i64, -(1 << 39));
}

#[test]
fn test_write_then_read_continues_after_flushed_bits() {
    let base = Cursor::new((0u8..16).collect::<Vec<_>>());
    let options = BitStreamOptions::READ_WRITE.with_mode(StreamMode::Write);
    let mut stream = BitStream::with_options(base, options).unwrap();

    stream.write_word(0xFFF, 12).unwrap();
    stream.set_mode(StreamMode::Read).unwrap();
    assert_eq!(stream.read::<u8>(8).unwrap(), 2);
    assert_eq!(stream.read::<u8>(8).unwrap(), 3);

    let bytes = stream.into_inner().unwrap().into_inner();
    assert_eq!(&bytes[..4], &[0xFF, 0x0F, 2, 3]);
}

#[test]
fn test_read_then_write_overwrites_next_byte() {
    let base = Cursor::new(vec![0u8; 8]);
    let options = BitStreamOptions::READ_WRITE.with_mode(StreamMode::Read);
    let mut stream = BitStream::with_options(base, options).unwrap();

    assert_eq!(stream.read::<u8>(8).unwrap(), 0);
    stream.set_mode(StreamMode::Write).unwrap();
    assert_eq!(stream.bit_position().unwrap(), 8);
    stream.write(0xABu8, 8).unwrap();

    let bytes = stream.into_inner().unwrap().into_inner();
    assert_eq!(bytes, [0, 0xAB, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_mode_violations() {
    let mut reader = BitStream::reader(Cursor::new(vec![0u8; 4])).unwrap();
    assert!(matches!(
        reader.write_bool(true),
        Err(OxiBitError::WrongMode {
            expected: StreamMode::Write,
            ..
        })
    ));
    assert!(matches!(
        reader.set_mode(StreamMode::Write),
        Err(OxiBitError::PermissionDenied { .. })
    ));
}

#[test]
fn test_window_positions() {
    let base = Cursor::new((0u8..32).collect::<Vec<_>>());
    let options = BitStreamOptions::READ_ONLY.with_window(8, 12);
    let mut stream = BitStream::with_options(base, options).unwrap();

    assert_eq!(stream.bit_position().unwrap(), 0);
    assert_eq!(stream.bit_length().unwrap(), 32);
    assert_eq!(stream.read::<u8>(8).unwrap(), 8);
    assert_eq!(stream.read::<u8>(3).unwrap(), 9 & 0b111);
    assert_eq!(stream.bit_position().unwrap(), 11);

    // Nothing past the window end is visible
    let mut rest = [0u8; 4];
    stream.align_to_byte().unwrap();
    stream.read_bytes(&mut rest).unwrap();
    assert_eq!(rest, [10, 11, 0, 0]);

    stream.seek_to_start().unwrap();
    assert_eq!(stream.bit_position().unwrap(), 0);
}

#[test]
fn test_forward_only_streams() {
    let mut writer = BitStream::writer(ForwardWriter::new(Vec::new())).unwrap();
    writer.write_word(0x2A5, 10).unwrap();
    writer.write_f32(1.5).unwrap();
    assert!(writer.bit_position().unwrap_err().is_unsupported());
    let bytes = writer.into_inner().unwrap().into_inner();

    let mut reader = BitStream::reader(ForwardReader::new(bytes.as_slice())).unwrap();
    assert_eq!(reader.read_word(10, false).unwrap(), 0x2A5);
    assert_eq!(reader.read_f32().unwrap(), 1.5);
    assert!(reader.seek_to_start().unwrap_err().is_unsupported());
}

#[test]
fn test_bytes_bulk_and_packed() {
    let payload: Vec<u8> = (0..100).collect();
    let bytes = written(|s| {
        s.write_bytes(&payload).unwrap();
        s.write_word(0b101, 3).unwrap();
        s.write_bytes(&payload[..10]).unwrap();
        s.write_bytes_packed(&[1, 2, 3, 4, 5, 6, 7], 3).unwrap();
    });
    assert_eq!(&bytes[..100], &payload[..]);

    let mut stream = BitStream::reader(Cursor::new(bytes)).unwrap();
    let mut buf = vec![0u8; 100];
    stream.read_bytes(&mut buf).unwrap();
    assert_eq!(buf, payload);
    assert_eq!(stream.read_word(3, false).unwrap(), 0b101);
    let mut buf = [0u8; 10];
    stream.read_bytes(&mut buf).unwrap();
    assert_eq!(&buf, &payload[..10]);
    let mut packed = [0u8; 7];
    stream.read_bytes_packed(&mut packed, 3).unwrap();
    assert_eq!(packed, [1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_floats_and_times() {
    use std::time::{Duration, UNIX_EPOCH};

    let past = UNIX_EPOCH - Duration::from_secs(86_400 * 365);
    let future = UNIX_EPOCH + Duration::from_secs(4_000_000_000);
    let bytes = written(|s| {
        s.write_bool(true).unwrap();
        s.write_f64(std::f64::consts::PI).unwrap();
        s.write_f32(-0.0).unwrap();
        s.write_unix_time(past, 33).unwrap();
        s.write_unix_time(future, 40).unwrap();
    });

    let mut stream = BitStream::reader(Cursor::new(bytes)).unwrap();
    assert!(stream.read_bool().unwrap());
    assert_eq!(stream.read_f64().unwrap(), std::f64::consts::PI);
    assert!(stream.read_f32().unwrap().is_sign_negative());
    assert_eq!(stream.read_unix_time(33).unwrap(), past);
    assert_eq!(stream.read_unix_time(40).unwrap(), future);
}

#[test]
fn test_close_is_idempotent() {
    let mut stream = BitStream::writer(Cursor::new(Vec::new())).unwrap();
    stream.write_word(0x3, 2).unwrap();

    let base = stream.close().unwrap().unwrap();
    assert_eq!(base.into_inner(), [0x3]);
    assert!(stream.close().unwrap().is_none());
    assert!(matches!(stream.write_bool(true), Err(OxiBitError::Closed)));
}
