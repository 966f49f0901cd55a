//! Property tests for the byte source behind both delivery modes.

use mediafuzz_core::input::FuzzInput;
use mediafuzz_core::source::{ByteSource, Chunk, RequestLength};
use proptest::prelude::*;

fn request_strategy() -> impl Strategy<Value = RequestLength> {
    prop_oneof![
        4 => (1u64..512).prop_map(RequestLength::Exact),
        1 => Just(RequestLength::Remaining),
    ]
}

proptest! {
    /// Any sequence of non-empty requests hands out the input exactly once, in
    /// order, and then reports end-of-stream.
    #[test]
    fn requests_reassemble_the_input(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
        requests in proptest::collection::vec(request_strategy(), 1..64),
    ) {
        let mut source = ByteSource::new(FuzzInput::copied(&data));
        let mut received = Vec::new();

        for length in requests.into_iter().cycle() {
            match source.request(length) {
                Chunk::Data(slice) => {
                    prop_assert_eq!(slice.offset(), received.len() as u64);
                    if let RequestLength::Exact(requested) = length {
                        prop_assert!(slice.len() as u64 <= requested);
                    }
                    prop_assert!(!slice.is_empty());
                    received.extend_from_slice(&slice);
                }
                Chunk::EndOfStream => break,
            }
            prop_assert!(source.offset() <= source.total_size());
        }

        prop_assert_eq!(received, data);
        prop_assert_eq!(source.request(RequestLength::Remaining), Chunk::EndOfStream);
    }

    /// A seek inside the input repositions the next request there; a seek at
    /// or past the end leaves the cursor untouched.
    #[test]
    fn seek_positions_the_next_request(
        data in proptest::collection::vec(any::<u8>(), 1..1024),
        consumed in 0u64..1024,
        target in 0u64..2048,
    ) {
        let mut source = ByteSource::new(FuzzInput::copied(&data));
        let _ = source.request(RequestLength::Exact(consumed));
        let before = source.offset();
        let total = data.len() as u64;

        let accepted = source.seek(target);

        prop_assert_eq!(accepted, target < total);
        if accepted {
            prop_assert_eq!(source.offset(), target);
            match source.request(RequestLength::Remaining) {
                Chunk::Data(slice) => prop_assert_eq!(&slice[..], &data[target as usize..]),
                Chunk::EndOfStream => prop_assert!(false, "seek target {} is inside the input", target),
            }
        } else {
            prop_assert_eq!(source.offset(), before);
        }
    }

    #[test]
    fn raw_lengths_decode_to_exact_except_the_sentinel(raw in any::<u32>()) {
        let decoded = RequestLength::from_raw(raw);
        if raw == u32::MAX {
            prop_assert_eq!(decoded, RequestLength::Remaining);
        } else {
            prop_assert_eq!(decoded, RequestLength::Exact(u64::from(raw)));
        }
    }
}
