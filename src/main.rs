fn main() {
    cast_fs::run();
}
