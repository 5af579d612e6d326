use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vbus_ring::{RingBuffer, RingConfig};
use vbus_sync::IrqFree;

fn byte_mode(c: &mut Criterion) {
    let ring = RingBuffer::<256, 4, IrqFree>::new(IrqFree, RingConfig::interrupt_backed());
    c.bench_function("put_byte + drain 64", |b| {
        b.iter(|| {
            for i in 0..64u8 {
                let _ = ring.put_byte(black_box(i));
            }
            ring.start_read();
            let mut sum = 0u32;
            while let Some(byte) = ring.get_byte() {
                sum += u32::from(byte);
            }
            ring.stop_read(ring.total_len());
            black_box(sum)
        })
    });
}

fn block_mode(c: &mut Criterion) {
    let ring = RingBuffer::<256, 0, IrqFree>::new(IrqFree, RingConfig::dma_backed(16));
    let block = [0x5Au8; 16];
    c.bench_function("reserve/commit 8 blocks", |b| {
        b.iter(|| {
            for _ in 0..8 {
                if let Ok(slot) = ring.reserve_block() {
                    ring.write_block(&slot, black_box(&block));
                    ring.commit_block(slot);
                }
            }
            ring.stop_read(ring.len())
        })
    });
}

criterion_group!(benches, byte_mode, block_mode);
criterion_main!(benches);
