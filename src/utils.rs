use bitflags::bitflags;

bitflags! {
    pub struct RegexFlags: u32 {
        const NO_FLAG = 0;
        const IGNORECASE = 1 << 1;
        const MULTILINE = 1 << 2;
        const DOTALL = 1 << 3;
    }
}
