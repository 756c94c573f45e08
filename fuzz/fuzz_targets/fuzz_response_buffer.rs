//! Fuzz target: `ResponseBuffer::append`
//!
//! Splits the input into chunks at arbitrary points and checks the
//! accounting after every append: all bytes counted, storage below
//! capacity, chunks stored whole or not at all.
//!
//! cargo fuzz run fuzz_response_buffer

#![no_main]

use gsm_pppos::app::buffer::ResponseBuffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&cap, rest)) = data.split_first() else {
        return;
    };
    let capacity = usize::from(cap).max(1) * 8;
    let mut buffer = ResponseBuffer::with_capacity(capacity).unwrap();

    let mut total = 0;
    for chunk in rest.chunks(usize::from(cap % 31) + 1) {
        let before = buffer.stored_len();
        let dropped = buffer.append(chunk);
        total += chunk.len();
        assert!(dropped == 0 || dropped == chunk.len());
        assert_eq!(buffer.stored_len(), before + chunk.len() - dropped);
        assert!(buffer.stored_len() < capacity);
        assert_eq!(buffer.received_total(), total);
    }

    let _ = buffer.text();
    buffer.clear();
    assert_eq!(buffer.received_total(), 0);
});
