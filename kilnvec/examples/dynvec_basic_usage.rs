use kilnalloc::GlobalAllocator;
use kilnvec::DynVec;

fn main() {
    let mut v: DynVec<u64> = DynVec::new();

    for i in 0..1000 {
        v.push(i * i);
    }
    println!("Pushed {} values, capacity is {}", v.len(), v.capacity());

    v.insert(0, 999);
    v.remove_range(1, 500);
    println!("After insert and remove_range: len {}, front {}, back {}", v.len(), v.front(), v.back());

    let sum: u64 = v.iter().sum();
    println!("Sum is {sum}");

    // Hand the buffer to another container without copying. Both are bound to the process heap,
    // so the transfer is permitted.
    let mut adopted: DynVec<u64> = DynVec::new_in(GlobalAllocator::instance());
    adopted.transfer_from(&mut v);
    println!("Adopted {} values, source kept {}", adopted.len(), v.len());

    println!("Done");
}
